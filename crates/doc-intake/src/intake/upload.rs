use axum::body::Bytes;
use serde::Serialize;

use super::error::{FieldError, FieldIssue};

/// The closed set of document formats the intake accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Jpeg,
    Png,
}

impl DocumentKind {
    /// Resolve a declared content type, ignoring parameters and case.
    pub fn from_content_type(raw: &str) -> Option<Self> {
        let parsed: mime::Mime = raw.trim().parse().ok()?;
        match parsed.essence_str().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// A file part received from the client, owned for the length of one request.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(
        filename: Option<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename,
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An upload that passed every check, tagged with its resolved kind.
#[derive(Debug, Clone)]
pub struct ValidatedDocument {
    document: UploadedDocument,
    kind: DocumentKind,
}

impl ValidatedDocument {
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn bytes(&self) -> &Bytes {
        &self.document.bytes
    }

    pub fn size(&self) -> u64 {
        self.document.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("no file uploaded or file is empty")]
    Missing,
    #[error("only PDF and image files are allowed (received '{content_type}')")]
    UnsupportedType { content_type: String },
    #[error("file too large ({size} bytes, max {limit})")]
    TooLarge { size: u64, limit: u64 },
}

impl UploadRejection {
    pub fn issue(&self) -> FieldIssue {
        match self {
            Self::Missing => FieldIssue::Missing,
            Self::UnsupportedType { .. } => FieldIssue::UnsupportedType,
            Self::TooLarge { .. } => FieldIssue::TooLarge,
        }
    }

    pub fn into_field_error(self) -> FieldError {
        FieldError::new("file", self.issue(), self.to_string())
    }
}

/// Checks presence, type, then size; the first failure wins.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_bytes: u64,
}

impl UploadValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate(
        &self,
        document: Option<UploadedDocument>,
    ) -> Result<ValidatedDocument, UploadRejection> {
        let document = match document {
            Some(document) if !document.is_empty() => document,
            _ => return Err(UploadRejection::Missing),
        };

        let kind = DocumentKind::from_content_type(&document.content_type).ok_or_else(|| {
            UploadRejection::UnsupportedType {
                content_type: document.content_type.clone(),
            }
        })?;

        if document.len() > self.max_bytes {
            return Err(UploadRejection::TooLarge {
                size: document.len(),
                limit: self.max_bytes,
            });
        }

        Ok(ValidatedDocument { document, kind })
    }
}
