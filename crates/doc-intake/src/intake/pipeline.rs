use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::applicant::{ApplicantMetadata, MetadataNormalizer, RawApplicantFields};
use super::assembler::{assemble, ExtractionResult};
use super::clock::{Clock, SystemClock};
use super::error::{FieldError, FieldIssue, IntakeError, ValidationFailure};
use super::router::{ExtractionMethod, ExtractionRequest, Strategy};
use super::storage::{DocumentStore, ScratchStore};
use super::strategy::{ExtractionError, ExtractionInput, Extractors};
use super::upload::{DocumentKind, UploadValidator, UploadedDocument};
use crate::config::{AiUnavailablePolicy, AppConfig};

/// Limits and policies the pipeline applies to every submission.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_upload_bytes: u64,
    pub scratch_root: PathBuf,
    pub request_timeout: Duration,
    pub ai_policy: AiUnavailablePolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_upload_bytes: config.intake.max_upload_bytes,
            scratch_root: config.intake.scratch_root.clone(),
            request_timeout: config.intake.request_timeout,
            ai_policy: config.ai.unavailable_policy,
        }
    }
}

/// Everything one form post carried, before any validation.
#[derive(Debug, Clone, Default)]
pub struct IntakeSubmission {
    pub fields: RawApplicantFields,
    pub method: Option<String>,
    pub document: Option<UploadedDocument>,
}

pub struct IntakePipeline {
    validator: UploadValidator,
    normalizer: MetadataNormalizer,
    extractors: Extractors,
    settings: PipelineSettings,
}

impl IntakePipeline {
    pub fn new(settings: PipelineSettings, extractors: Extractors, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: UploadValidator::new(settings.max_upload_bytes),
            normalizer: MetadataNormalizer::new(clock),
            extractors,
            settings,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, IntakeError> {
        let extractors = Extractors::from_config(&config.ocr, &config.ai)?;
        Ok(Self::new(
            PipelineSettings::from_config(config),
            extractors,
            Arc::new(SystemClock),
        ))
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.validator.max_bytes()
    }

    /// Validate, extract, and assemble one submission.
    pub async fn submit(
        &self,
        submission: IntakeSubmission,
    ) -> Result<ExtractionResult, IntakeError> {
        let request_id = Uuid::new_v4();
        let (request, applicant) = self.validate(submission).map_err(|failure| {
            info!(%request_id, %failure, "submission rejected");
            IntakeError::Validation(failure)
        })?;

        let span = tracing::info_span!(
            "intake",
            %request_id,
            method = request.method().label(),
            content_type = request.document().kind().mime_type(),
            size = request.document().size(),
        );

        let deadline = self.settings.request_timeout;
        match tokio::time::timeout(deadline, self.run(&request, &applicant))
            .instrument(span)
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%request_id, ?deadline, "extraction abandoned after deadline");
                Err(IntakeError::TimedOut(deadline))
            }
        }
    }

    fn validate(
        &self,
        submission: IntakeSubmission,
    ) -> Result<(ExtractionRequest, ApplicantMetadata), ValidationFailure> {
        let IntakeSubmission {
            fields,
            method,
            document,
        } = submission;

        let mut errors = Vec::new();

        let document = self
            .validator
            .validate(document)
            .map_err(|rejection| errors.push(rejection.into_field_error()))
            .ok();

        let applicant = self
            .normalizer
            .normalize(&fields)
            .map_err(|field_errors| errors.extend(field_errors))
            .ok();

        let method = match method.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(FieldError::new(
                    "extraction-method",
                    FieldIssue::Required,
                    "Extraction method is required",
                ));
                None
            }
            Some(raw) => {
                let parsed = ExtractionMethod::parse(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new(
                        "extraction-method",
                        FieldIssue::UnknownMethod,
                        format!("'{raw}' is not a supported extraction method"),
                    ));
                }
                parsed
            }
        };

        match (document, applicant, method) {
            (Some(document), Some(applicant), Some(method)) if errors.is_empty() => {
                Ok((ExtractionRequest::new(method, document), applicant))
            }
            _ => Err(ValidationFailure { errors }),
        }
    }

    async fn run(
        &self,
        request: &ExtractionRequest,
        applicant: &ApplicantMetadata,
    ) -> Result<ExtractionResult, IntakeError> {
        let document = request.document();
        let kind = document.kind();

        let store = ScratchStore::create_in(&self.settings.scratch_root).await?;
        let stored = store.save(kind.extension(), document.bytes()).await?;
        let parser_bytes = store.read(&stored).await?;

        let selection = request.route();
        let parser = self.run_strategy(selection.parser, parser_bytes, kind, applicant);
        let (vision, parser) = match selection.vision {
            Some(vision) => {
                let vision =
                    self.run_strategy(vision, document.bytes().clone(), kind, applicant);
                let (vision, parser) = tokio::join!(vision, parser);
                (Some(vision), parser)
            }
            None => (None, parser.await),
        };

        if let Err(err) = store.delete(stored).await {
            warn!(error = %err, "scratch file removal failed; directory cleanup will retry");
        }
        if let Err(err) = store.close().await {
            warn!(error = %err, "scratch directory removal failed");
        }

        let (ai_text, parser_text) = resolve_outcomes(self.settings.ai_policy, vision, parser)?;
        Ok(assemble(applicant, request.method(), ai_text, parser_text))
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        bytes: Bytes,
        kind: DocumentKind,
        applicant: &ApplicantMetadata,
    ) -> Result<String, ExtractionError> {
        let start = Instant::now();
        let input = ExtractionInput {
            bytes,
            kind,
            applicant,
        };
        let outcome = self.extractors.for_strategy(strategy).extract(input).await;
        match &outcome {
            Ok(text) => info!(
                strategy = strategy.name(),
                elapsed_ms = %start.elapsed().as_millis(),
                chars = text.len(),
                "strategy finished"
            ),
            Err(err) => warn!(
                strategy = strategy.name(),
                elapsed_ms = %start.elapsed().as_millis(),
                kind = err.kind(),
                error = %err,
                "strategy failed"
            ),
        }
        outcome
    }
}

/// Combine per-strategy outcomes into `(ai_text, parser_text)`.
///
/// A vision failure never sinks the request unless the credential is
/// unusable under [`AiUnavailablePolicy::Require`]. A parser failure only
/// surfaces when there is no vision text to return instead. No text at all
/// is [`IntakeError::ExhaustedExtraction`].
fn resolve_outcomes(
    policy: AiUnavailablePolicy,
    vision: Option<Result<String, ExtractionError>>,
    parser: Result<String, ExtractionError>,
) -> Result<(Option<String>, String), IntakeError> {
    let ai_text = match vision {
        None => None,
        Some(Ok(text)) if text.trim().is_empty() => None,
        Some(Ok(text)) => Some(text),
        Some(Err(err @ ExtractionError::UpstreamUnavailable(_)))
            if policy == AiUnavailablePolicy::Require =>
        {
            return Err(err.into());
        }
        Some(Err(err)) => {
            warn!(kind = err.kind(), "continuing with parser text only");
            None
        }
    };

    let parser_text = match parser {
        Ok(text) => text.trim().to_string(),
        Err(err) if ai_text.is_some() => {
            warn!(kind = err.kind(), "continuing with vision text only");
            String::new()
        }
        Err(err) => return Err(err.into()),
    };

    if ai_text.is_none() && parser_text.is_empty() {
        return Err(IntakeError::ExhaustedExtraction);
    }

    Ok((ai_text, parser_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_down() -> ExtractionError {
        ExtractionError::UpstreamUnavailable("no key".into())
    }

    fn upstream_500() -> ExtractionError {
        ExtractionError::UpstreamError {
            status: Some(500),
            message: "overloaded".into(),
        }
    }

    #[test]
    fn standard_request_passes_parser_text_through() {
        let (ai, parser) =
            resolve_outcomes(AiUnavailablePolicy::Degrade, None, Ok(" text \n".into()))
                .expect("success");
        assert_eq!(ai, None);
        assert_eq!(parser, "text");
    }

    #[test]
    fn upstream_failure_degrades_to_parser_text() {
        for policy in [AiUnavailablePolicy::Degrade, AiUnavailablePolicy::Require] {
            let (ai, parser) =
                resolve_outcomes(policy, Some(Err(upstream_500())), Ok("ocr".into()))
                    .expect("partial success");
            assert_eq!(ai, None);
            assert_eq!(parser, "ocr");
        }
    }

    #[test]
    fn unavailable_credential_follows_policy() {
        let degraded = resolve_outcomes(
            AiUnavailablePolicy::Degrade,
            Some(Err(upstream_down())),
            Ok("ocr".into()),
        )
        .expect("degrades");
        assert_eq!(degraded, (None, "ocr".to_string()));

        match resolve_outcomes(
            AiUnavailablePolicy::Require,
            Some(Err(upstream_down())),
            Ok("ocr".into()),
        ) {
            Err(IntakeError::Extraction(ExtractionError::UpstreamUnavailable(_))) => {}
            other => panic!("expected upstream unavailable, got {other:?}"),
        }
    }

    #[test]
    fn parser_failure_is_tolerated_when_vision_has_text() {
        let (ai, parser) = resolve_outcomes(
            AiUnavailablePolicy::Degrade,
            Some(Ok("vision text".into())),
            Err(ExtractionError::RecognitionFailure("blurry".into())),
        )
        .expect("vision carries the request");
        assert_eq!(ai.as_deref(), Some("vision text"));
        assert!(parser.is_empty());
    }

    #[test]
    fn parser_failure_without_vision_text_surfaces() {
        match resolve_outcomes(
            AiUnavailablePolicy::Degrade,
            Some(Err(upstream_500())),
            Err(ExtractionError::MalformedDocument("truncated".into())),
        ) {
            Err(IntakeError::Extraction(ExtractionError::MalformedDocument(_))) => {}
            other => panic!("expected malformed document, got {other:?}"),
        }
    }

    #[test]
    fn no_text_anywhere_is_exhaustion() {
        assert!(matches!(
            resolve_outcomes(AiUnavailablePolicy::Degrade, None, Ok("   ".into())),
            Err(IntakeError::ExhaustedExtraction)
        ));
        assert!(matches!(
            resolve_outcomes(
                AiUnavailablePolicy::Degrade,
                Some(Ok("\n".into())),
                Ok(String::new())
            ),
            Err(IntakeError::ExhaustedExtraction)
        ));
    }
}
