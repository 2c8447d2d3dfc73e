//! Document intake: validation, strategy routing, extraction, and assembly.

pub mod applicant;
pub mod assembler;
pub mod clock;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod router;
pub mod storage;
pub mod strategy;
pub mod upload;

pub use applicant::{ApplicantMetadata, MetadataNormalizer, RawApplicantFields};
pub use assembler::{assemble, ExtractionResult};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{FieldError, FieldIssue, IntakeError, ValidationFailure};
pub use http::intake_router;
pub use pipeline::{IntakePipeline, IntakeSubmission, PipelineSettings};
pub use router::{ExtractionMethod, Strategy, StrategySelection};
pub use strategy::{ExtractionError, ExtractionInput, Extractors, TextExtractor};
pub use upload::{DocumentKind, UploadValidator, UploadedDocument};
