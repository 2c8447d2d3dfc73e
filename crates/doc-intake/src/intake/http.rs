use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::error::{FieldError, FieldIssue, IntakeError, ValidationFailure};
use super::pipeline::{IntakePipeline, IntakeSubmission};
use super::upload::UploadedDocument;

/// Multipart framing overhead allowed on top of the file ceiling.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Router exposing the intake endpoint and its legacy alias.
pub fn intake_router(pipeline: Arc<IntakePipeline>) -> Router {
    let body_limit = usize::try_from(pipeline.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/api/v1/intake", post(submit_handler))
        .route("/process", post(submit_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(pipeline)
}

pub(crate) async fn submit_handler(
    State(pipeline): State<Arc<IntakePipeline>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let submission = match multipart {
        Ok(multipart) => read_submission(multipart).await,
        Err(rejection) => Err(single_failure(FieldError::new(
            "form",
            FieldIssue::Malformed,
            rejection.body_text(),
        ))),
    };

    let outcome = match submission {
        Ok(submission) => pipeline.submit(submission).await,
        Err(failure) => Err(IntakeError::Validation(failure)),
    };

    match outcome {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Drain the form into an [`IntakeSubmission`]. Unknown parts are ignored.
async fn read_submission(mut multipart: Multipart) -> Result<IntakeSubmission, ValidationFailure> {
    let mut submission = IntakeSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(stream_failure)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "first-name" | "firstName" => {
                submission.fields.first_name = Some(text(field).await?);
            }
            "last-name" | "lastName" => {
                submission.fields.last_name = Some(text(field).await?);
            }
            "dob" => submission.fields.dob = Some(text(field).await?),
            "extraction-method" | "extractionMethod" => {
                submission.method = Some(text(field).await?);
            }
            "file" => {
                let filename = field.file_name().map(str::to_owned);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(stream_failure)?;
                submission.document = Some(UploadedDocument::new(filename, content_type, bytes));
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(submission)
}

async fn text(field: Field<'_>) -> Result<String, ValidationFailure> {
    field.text().await.map_err(stream_failure)
}

fn stream_failure(err: MultipartError) -> ValidationFailure {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return single_failure(FieldError::new(
            "file",
            FieldIssue::TooLarge,
            "upload exceeds the request size limit",
        ));
    }
    single_failure(FieldError::new("form", FieldIssue::Malformed, err.body_text()))
}

fn single_failure(error: FieldError) -> ValidationFailure {
    ValidationFailure {
        errors: vec![error],
    }
}
