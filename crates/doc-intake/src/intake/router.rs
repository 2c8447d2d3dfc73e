use serde::Serialize;

use super::upload::{DocumentKind, ValidatedDocument};

/// Extraction mode chosen on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Standard,
    Ai,
}

impl ExtractionMethod {
    /// Accepts both the form values (`standard-method`) and bare names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard-method" | "standard" => Some(Self::Standard),
            "ai-method" | "ai" => Some(Self::Ai),
            _ => None,
        }
    }

    /// Label echoed back to the display layer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard-method",
            Self::Ai => "ai-method",
        }
    }
}

/// The closed set of extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PdfText,
    ImageOcr,
    AiVision,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PdfText => "pdf_text",
            Self::ImageOcr => "image_ocr",
            Self::AiVision => "ai_vision",
        }
    }
}

/// Strategies to run for one request. The parser strategy always runs; the
/// vision strategy is additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySelection {
    pub parser: Strategy,
    pub vision: Option<Strategy>,
}

impl StrategySelection {
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut strategies = Vec::with_capacity(2);
        strategies.extend(self.vision);
        strategies.push(self.parser);
        strategies
    }
}

/// A validated document paired with its requested method.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    method: ExtractionMethod,
    document: ValidatedDocument,
}

impl ExtractionRequest {
    pub fn new(method: ExtractionMethod, document: ValidatedDocument) -> Self {
        Self { method, document }
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    pub fn document(&self) -> &ValidatedDocument {
        &self.document
    }

    pub fn route(&self) -> StrategySelection {
        select(self.method, self.document.kind())
    }
}

pub fn select(method: ExtractionMethod, kind: DocumentKind) -> StrategySelection {
    let parser = match kind {
        DocumentKind::Pdf => Strategy::PdfText,
        DocumentKind::Jpeg | DocumentKind::Png => Strategy::ImageOcr,
    };
    let vision = match method {
        ExtractionMethod::Standard => None,
        ExtractionMethod::Ai => Some(Strategy::AiVision),
    };
    StrategySelection { parser, vision }
}

/// Route on a raw content type; `None` for anything outside the allow-list.
pub fn select_for_content_type(
    method: ExtractionMethod,
    content_type: &str,
) -> Option<StrategySelection> {
    DocumentKind::from_content_type(content_type).map(|kind| select(method, kind))
}
