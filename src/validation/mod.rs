//! Per-item validation.
//!
//! An item passes through four tiers:
//!
//! 1. [`SchemaValidator`]: required fields, types and identifier formats
//! 2. [`TemplateValidator`]: the template's payload contract
//! 3. [`MetadataValidator`]: curriculum references (advisory, except telemetry)
//! 4. quality scoring, see [`crate::quality`]
//!
//! [`ItemPipeline`] composes them into one [`ItemResult`].

mod issue;
pub mod metadata_validator;
pub mod pipeline;
pub mod schema_validator;
pub mod template_validator;

pub use issue::{IssueCode, Severity, Tier, TierResult, ValidationIssue};
pub use metadata_validator::MetadataValidator;
pub use pipeline::{fallback_item_id, ItemPipeline, ItemResult, ItemTiers, ItemValidator};
pub use schema_validator::{SchemaValidator, REQUIRED_FIELDS};
pub use template_validator::{TemplateContract, TemplateValidator, MAX_OPTIONS, MIN_OPTIONS};
