//! Batch certification of question submissions.
//!
//! This module provides:
//! - [`Submission`] normalisation of bare item arrays and manifest documents
//! - [`BatchConfig`] with builder methods and environment overrides
//! - [`BatchOrchestrator`], a bounded worker pool feeding a single aggregator
//! - Batch-only analyses (duplicate ids, coverage gaps, manifest counts)
//! - [`BatchReport`] with JSON and CSV output
//!
//! # Example
//!
//! ```ignore
//! use question_certify::batch::{BatchConfig, BatchOrchestrator};
//!
//! let orchestrator = BatchOrchestrator::new(BatchConfig::new().with_max_parallel(8));
//! let report = orchestrator.validate_submission(submission).await;
//! println!("{}", report.to_csv());
//! ```

mod aggregator;
pub mod analysis;
mod cancel;
mod config;
mod input;
mod orchestrator;
mod report;

pub use aggregator::{BatchSummary, Progress, SummaryAccumulator, UNKNOWN_TEMPLATE_BUCKET};
pub use analysis::{CoverageStats, COVERAGE_GAP_RATIO};
pub use cancel::CancellationSignal;
pub use config::{
    BatchConfig, ConfigError, ProgressCallback, DEFAULT_ITEM_TIMEOUT, DEFAULT_MAX_PARALLEL,
};
pub use input::{load_document, Manifest, Submission};
pub use orchestrator::BatchOrchestrator;
pub use report::{csv_status, BatchReport, GlobalIssue, PerformanceMetrics, CSV_HEADER};
