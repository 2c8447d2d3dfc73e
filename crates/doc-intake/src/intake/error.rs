use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::storage::StorageError;
use super::strategy::ExtractionError;

/// Machine-readable reason attached to a rejected form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldIssue {
    Required,
    InvalidDate,
    FutureDate,
    UnknownMethod,
    Missing,
    UnsupportedType,
    TooLarge,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: FieldIssue,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: FieldIssue, message: impl Into<String>) -> Self {
        Self {
            field,
            reason,
            message: message.into(),
        }
    }
}

/// Every input problem found before extraction started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    pub fn has(&self, field: &str, reason: FieldIssue) -> bool {
        self.errors
            .iter()
            .any(|error| error.field == field && error.reason == reason)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.errors.iter().map(|error| error.field).collect();
        write!(f, "invalid field(s): {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationFailure {}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("no extraction strategy produced any text")]
    ExhaustedExtraction,
    #[error("extraction did not finish within {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntakeError {
    pub fn status(&self) -> StatusCode {
        match self {
            IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
            IntakeError::Extraction(ExtractionError::UpstreamUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            IntakeError::Extraction(ExtractionError::UpstreamError { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            IntakeError::Extraction(_) | IntakeError::ExhaustedExtraction => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            IntakeError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            IntakeError::Storage(_) | IntakeError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            IntakeError::Validation(failure) => json!({
                "error": "validation failed",
                "fields": failure.errors,
            }),
            IntakeError::Extraction(err) => json!({
                "error": err.public_message(),
                "kind": err.kind(),
            }),
            IntakeError::ExhaustedExtraction => json!({
                "error": "no text could be extracted from the document",
                "kind": "exhausted_extraction",
            }),
            IntakeError::TimedOut(_) => json!({ "error": "extraction timed out" }),
            IntakeError::Storage(_) | IntakeError::Internal(_) => {
                tracing::error!(error = %self, "intake failed");
                json!({ "error": "internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_separate_local_and_upstream_failures() {
        let local = IntakeError::from(ExtractionError::RecognitionFailure("bad".into()));
        let upstream = IntakeError::from(ExtractionError::UpstreamError {
            status: Some(500),
            message: "boom".into(),
        });
        assert_eq!(local.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            IntakeError::Internal("db".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_failure_lists_fields() {
        let failure = ValidationFailure {
            errors: vec![
                FieldError::new("file", FieldIssue::Missing, "no file"),
                FieldError::new("dob", FieldIssue::InvalidDate, "bad date"),
            ],
        };
        assert!(failure.has("dob", FieldIssue::InvalidDate));
        assert!(!failure.has("dob", FieldIssue::Required));
        assert_eq!(failure.to_string(), "invalid field(s): file, dob");
    }
}
