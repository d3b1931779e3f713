//! Error types for question certification.
//!
//! Defines error types for the major subsystems:
//! - Item decoding (non-object items, payloads that do not fit their template)
//! - Submission loading and normalisation
//! - Curriculum index loading
//! - Report output
//!
//! Per-item validation problems are never errors: validators report them as
//! structured `ValidationIssue`s. The types here cover the few cases where a
//! validator or loader genuinely cannot continue.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating a single item.
///
/// The batch orchestrator converts any of these into a CRITICAL
/// `VALIDATION_ERROR` result for the item, so they never abort a batch.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Item must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Unknown template id '{0}'")]
    UnknownTemplate(String),

    #[error("Validator failed: {0}")]
    Internal(String),
}

/// A template payload or answer key that does not decode into the shape its
/// template requires.
#[derive(Debug, Error)]
#[error("Invalid {field}: {source}")]
pub struct PayloadError {
    /// Which part of the item failed to decode (`template_payload` or `answer_key`).
    pub field: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Errors that can occur while loading or normalising a submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Submission must be an array of items or an object with an 'items' array, found {found}")]
    InvalidFormat { found: &'static str },

    #[error("Unsupported submission file extension for '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while loading a curriculum index.
#[derive(Debug, Error)]
pub enum CurriculumError {
    #[error("Unsupported curriculum file extension for '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(PathBuf),

    #[error("Curriculum index is inconsistent: {0}")]
    Inconsistent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while writing a batch report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display() {
        let err = ItemError::NotAnObject { found: "null" };
        assert!(err.to_string().contains("null"));

        let err = ItemError::UnknownTemplate("drag_drop".to_string());
        assert!(err.to_string().contains("drag_drop"));
    }

    #[test]
    fn test_payload_error_names_field() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = PayloadError {
            field: "answer_key",
            source,
        };
        assert!(err.to_string().starts_with("Invalid answer_key"));
    }

    #[test]
    fn test_submission_error_display() {
        let err = SubmissionError::InvalidFormat { found: "string" };
        assert!(err.to_string().contains("'items'"));
        assert!(err.to_string().contains("string"));
    }
}
