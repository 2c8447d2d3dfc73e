//! Applicant document intake: upload validation, metadata normalization, and
//! text extraction through local parsing, OCR, or a remote vision model.

pub mod config;
pub mod error;
pub mod intake;
pub mod telemetry;
