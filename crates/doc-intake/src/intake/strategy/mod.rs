//! Text extraction strategies behind one capability: bytes in, text out.

mod ocr;
mod pdf;
mod vision;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;

use super::applicant::ApplicantMetadata;
use super::router::Strategy;
use super::upload::DocumentKind;
use crate::config::{AiConfig, OcrConfig};

pub use ocr::TesseractOcr;
pub use pdf::PdfTextExtractor;
pub use vision::{vision_instruction, GeminiVision};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("document could not be parsed: {0}")]
    MalformedDocument(String),
    #[error("text recognition failed: {0}")]
    RecognitionFailure(String),
    #[error("AI service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("AI service request failed (status {status:?}): {message}")]
    UpstreamError {
        status: Option<u16>,
        message: String,
    },
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedDocument(_) => "malformed_document",
            Self::RecognitionFailure(_) => "recognition_failure",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamError { .. } => "upstream_error",
        }
    }

    /// Message safe to hand to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedDocument(_) => "the document could not be parsed",
            Self::RecognitionFailure(_) => "text recognition failed",
            Self::UpstreamUnavailable(_) => "the AI service is unavailable",
            Self::UpstreamError { .. } => "the AI service request failed",
        }
    }
}

/// One document handed to a strategy. `bytes` is a cheap shared handle.
#[derive(Debug, Clone)]
pub struct ExtractionInput<'a> {
    pub bytes: Bytes,
    pub kind: DocumentKind,
    pub applicant: &'a ApplicantMetadata,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, input: ExtractionInput<'_>) -> Result<String, ExtractionError>;
}

/// One extractor per strategy, resolved once at startup.
#[derive(Clone)]
pub struct Extractors {
    pub pdf: Arc<dyn TextExtractor>,
    pub ocr: Arc<dyn TextExtractor>,
    pub vision: Arc<dyn TextExtractor>,
}

impl Extractors {
    pub fn from_config(ocr: &OcrConfig, ai: &AiConfig) -> Result<Self, ExtractionError> {
        Ok(Self {
            pdf: Arc::new(PdfTextExtractor),
            ocr: Arc::new(TesseractOcr::new(ocr)),
            vision: Arc::new(GeminiVision::new(ai)?),
        })
    }

    pub fn for_strategy(&self, strategy: Strategy) -> &Arc<dyn TextExtractor> {
        match strategy {
            Strategy::PdfText => &self.pdf,
            Strategy::ImageOcr => &self.ocr,
            Strategy::AiVision => &self.vision,
        }
    }
}
