use chrono::{NaiveDate, Utc};

/// Source of the calendar date used for DOB checks and age arithmetic.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Server clock evaluated in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
