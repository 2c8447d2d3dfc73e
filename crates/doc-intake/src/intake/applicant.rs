use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::error::{FieldError, FieldIssue};

/// Applicant fields exactly as they arrived on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawApplicantFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantMetadata {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub age: u32,
}

impl ApplicantMetadata {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Completed birthdays between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn parse_dob(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
}

pub struct MetadataNormalizer {
    clock: Arc<dyn Clock>,
}

impl MetadataNormalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Validate every field and report all problems together.
    pub fn normalize(
        &self,
        raw: &RawApplicantFields,
    ) -> Result<ApplicantMetadata, Vec<FieldError>> {
        let mut errors = Vec::new();

        let first_name = required(&raw.first_name, "first-name", "First name", &mut errors);
        let last_name = required(&raw.last_name, "last-name", "Last name", &mut errors);

        let today = self.clock.today();
        let date_of_birth = match raw.dob.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::new(
                    "dob",
                    FieldIssue::Required,
                    "Date of birth is required",
                ));
                None
            }
            Some(value) => match parse_dob(value) {
                Ok(date) if date > today => {
                    errors.push(FieldError::new(
                        "dob",
                        FieldIssue::FutureDate,
                        format!("Date of birth {date} is after {today}"),
                    ));
                    None
                }
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(FieldError::new(
                        "dob",
                        FieldIssue::InvalidDate,
                        format!("'{value}' is not a YYYY-MM-DD date"),
                    ));
                    None
                }
            },
        };

        match (first_name, last_name, date_of_birth) {
            (Some(first_name), Some(last_name), Some(date_of_birth)) if errors.is_empty() => {
                Ok(ApplicantMetadata {
                    first_name,
                    last_name,
                    age: age_on(date_of_birth, today),
                    date_of_birth,
                })
            }
            _ => Err(errors),
        }
    }
}

fn required(
    value: &Option<String>,
    field: &'static str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Some(trimmed.to_string()),
        _ => {
            errors.push(FieldError::new(
                field,
                FieldIssue::Required,
                format!("{label} is required"),
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::clock::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn normalizer_on(today: NaiveDate) -> MetadataNormalizer {
        MetadataNormalizer::new(Arc::new(FixedClock(today)))
    }

    fn fields(first: &str, last: &str, dob: &str) -> RawApplicantFields {
        RawApplicantFields {
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            dob: Some(dob.to_string()),
        }
    }

    #[test]
    fn age_counts_completed_birthdays() {
        let dob = date(2000, 6, 15);
        assert_eq!(age_on(dob, date(2024, 6, 14)), 23);
        assert_eq!(age_on(dob, date(2024, 6, 15)), 24);
        assert_eq!(age_on(dob, date(2024, 12, 31)), 24);
        assert_eq!(age_on(dob, dob), 0);
    }

    #[test]
    fn leap_day_birthday_turns_over_on_march_first() {
        let dob = date(2000, 2, 29);
        assert_eq!(age_on(dob, date(2023, 2, 28)), 22);
        assert_eq!(age_on(dob, date(2023, 3, 1)), 23);
    }

    #[test]
    fn normalizes_trimmed_names_and_age() {
        let metadata = normalizer_on(date(2024, 6, 14))
            .normalize(&fields("  Ada ", " Lovelace", "2000-06-15"))
            .expect("valid applicant");
        assert_eq!(metadata.full_name(), "Ada Lovelace");
        assert_eq!(metadata.age, 23);
    }

    #[test]
    fn dob_today_is_accepted_and_tomorrow_rejected() {
        let normalizer = normalizer_on(date(2024, 6, 15));
        let metadata = normalizer
            .normalize(&fields("Ada", "Lovelace", "2024-06-15"))
            .expect("born today");
        assert_eq!(metadata.age, 0);

        let errors = normalizer
            .normalize(&fields("Ada", "Lovelace", "2024-06-16"))
            .expect_err("future dob");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "dob");
        assert_eq!(errors[0].reason, FieldIssue::FutureDate);
    }

    #[test]
    fn reports_every_failing_field() {
        let raw = RawApplicantFields {
            first_name: Some("   ".to_string()),
            last_name: None,
            dob: Some("15/06/2000".to_string()),
        };
        let errors = normalizer_on(date(2024, 1, 1))
            .normalize(&raw)
            .expect_err("three failures");
        let summary: Vec<_> = errors.iter().map(|e| (e.field, e.reason)).collect();
        assert_eq!(
            summary,
            vec![
                ("first-name", FieldIssue::Required),
                ("last-name", FieldIssue::Required),
                ("dob", FieldIssue::InvalidDate),
            ]
        );
    }
}
