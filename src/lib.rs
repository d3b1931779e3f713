//! question-certify: certification of educational question items.
//!
//! Every item passes four tiers (schema, template contract, curriculum
//! metadata, quality) and batches add cross-item checks such as duplicate
//! ids and coverage gaps.

pub mod batch;
pub mod cli;
pub mod curriculum;
pub mod error;
pub mod item;
pub mod quality;
pub mod validation;

// Re-export commonly used types
pub use batch::{BatchConfig, BatchOrchestrator, BatchReport, CancellationSignal, Submission};
pub use curriculum::CurriculumIndex;
pub use error::{CurriculumError, ItemError, PayloadError, ReportError, SubmissionError};
pub use validation::{ItemPipeline, ItemResult, ItemValidator, ValidationIssue};
