//! Per-item pipeline composing the four validation tiers.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::issue::{IssueCode, Tier, TierResult, ValidationIssue};
use super::metadata_validator::MetadataValidator;
use super::schema_validator::SchemaValidator;
use super::template_validator::TemplateValidator;
use crate::curriculum::CurriculumIndex;
use crate::error::ItemError;
use crate::item::QuestionItem;
use crate::quality::{QualityAssessment, QualityGrade, QualityScorer};

/// Tier results of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTiers {
    pub schema: TierResult,
    pub template: TierResult,
    pub metadata: TierResult,
    pub quality: TierResult,
}

/// Verdict for one item of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    /// The item's id, or `item[<index>]` when it has none.
    pub item_id: String,
    /// Template id as declared, if it was a string.
    pub template_id: Option<String>,
    /// Schema, template and metadata tiers all passed.
    pub is_valid: bool,
    /// CRITICAL issues of the structural tiers, deduplicated.
    pub errors: Vec<ValidationIssue>,
    /// WARNING issues of the structural tiers, deduplicated.
    pub warnings: Vec<ValidationIssue>,
    pub quality_score: f64,
    pub quality_grade: QualityGrade,
    pub tiers: ItemTiers,
}

impl ItemResult {
    /// Composes tier results. Validity is derived from the structural tiers
    /// only; the quality tier never affects it.
    pub fn from_tiers(
        item_id: impl Into<String>,
        template_id: Option<String>,
        tiers: ItemTiers,
        assessment: &QualityAssessment,
    ) -> Self {
        let structural = [&tiers.schema, &tiers.template, &tiers.metadata];
        let is_valid = structural.iter().all(|t| t.is_valid);
        let errors = dedup(structural.iter().flat_map(|t| t.errors.iter()));
        let warnings = dedup(structural.iter().flat_map(|t| t.warnings.iter()));

        Self {
            item_id: item_id.into(),
            template_id,
            is_valid,
            errors,
            warnings,
            quality_score: assessment.score,
            quality_grade: assessment.grade,
            tiers,
        }
    }

    /// Builds the invalid result used when an item could not be validated
    /// (internal error, timeout or cancellation).
    ///
    /// Every structural tier carries `issue`; the quality tier records the
    /// failing assessment.
    pub fn from_failure(item: &Value, index: usize, issue: ValidationIssue) -> Self {
        let mut result = Self::failure(item, issue);
        result.fill_missing_id(index);
        result
    }

    fn failure(item: &Value, issue: ValidationIssue) -> Self {
        let (item_id, template_id) = identity(item);
        let failed = TierResult::failed(Tier::Schema, issue.clone());
        let tiers = ItemTiers {
            schema: failed.clone(),
            template: TierResult {
                tier: Tier::Template,
                ..failed.clone()
            },
            metadata: TierResult {
                tier: Tier::Metadata,
                ..failed
            },
            quality: QualityAssessment::failing().to_tier_result(),
        };
        Self::from_tiers(
            item_id.unwrap_or_default(),
            template_id,
            tiers,
            &QualityAssessment::failing(),
        )
    }

    /// Result for an item whose validation returned an error or panicked.
    pub fn validation_error(item: &Value, index: usize, message: impl Into<String>) -> Self {
        let issue = ValidationIssue::critical(IssueCode::ValidationError, "", message);
        Self::from_failure(item, index, issue)
    }

    /// Result for an item whose validation exceeded its time budget.
    pub fn validation_timeout(item: &Value, index: usize, timeout_ms: u128) -> Self {
        let issue = ValidationIssue::critical(
            IssueCode::ValidationTimeout,
            "",
            format!("Validation did not finish within {} ms", timeout_ms),
        );
        Self::from_failure(item, index, issue)
    }

    /// Result for an item left unprocessed by a cancelled batch.
    pub fn validation_cancelled(item: &Value, index: usize) -> Self {
        let issue = ValidationIssue::critical(
            IssueCode::ValidationCancelled,
            "",
            "Batch was cancelled before this item was validated",
        );
        Self::from_failure(item, index, issue)
    }

    /// Uses `item[<index>]` as the id of items that have none.
    pub fn fill_missing_id(&mut self, index: usize) {
        if self.item_id.trim().is_empty() {
            self.item_id = fallback_item_id(index);
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Code of the first CRITICAL issue, if any.
    pub fn primary_error_code(&self) -> Option<IssueCode> {
        self.errors.first().map(|i| i.code)
    }
}

/// Placeholder id for an item at `index` without a usable `item_id`.
pub fn fallback_item_id(index: usize) -> String {
    format!("item[{}]", index)
}

fn identity(item: &Value) -> (Option<String>, Option<String>) {
    match QuestionItem::from_value(item) {
        Ok(view) => (
            view.reported_id(),
            view.declared_template().map(str::to_string),
        ),
        Err(_) => (None, None),
    }
}

fn dedup<'a>(issues: impl Iterator<Item = &'a ValidationIssue>) -> Vec<ValidationIssue> {
    let mut seen = HashSet::new();
    issues
        .filter(|i| seen.insert((i.code, i.field.as_str())))
        .cloned()
        .collect()
}

/// Validates a single item.
///
/// This is the unit of work scheduled by the batch orchestrator.
/// Implementations must be safe to call from several workers at once.
pub trait ItemValidator: Send + Sync {
    fn validate(&self, item: &Value) -> Result<ItemResult, ItemError>;
}

/// Production validator running schema, template, metadata and quality tiers.
///
/// Every tier runs for every object item so authors get complete feedback
/// in one pass; an unknown template only replaces the template tier with a
/// synthetic failure.
#[derive(Debug, Clone, Default)]
pub struct ItemPipeline {
    curriculum: Option<Arc<CurriculumIndex>>,
    scorer: QualityScorer,
}

impl ItemPipeline {
    pub fn new(curriculum: Option<Arc<CurriculumIndex>>) -> Self {
        Self {
            curriculum,
            scorer: QualityScorer::new(),
        }
    }

    /// Builder method to replace the quality scorer.
    pub fn with_scorer(mut self, scorer: QualityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Runs every tier on one item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::NotAnObject` for null and non-object values.
    pub fn run(&self, value: &Value) -> Result<ItemResult, ItemError> {
        let item = QuestionItem::from_value(value)?;

        let schema = SchemaValidator::validate_item(value)?;
        let template = TemplateValidator::validate_item(value)?;
        let metadata = MetadataValidator::new(self.curriculum.as_deref()).validate_item(value)?;
        let assessment = self.scorer.assess_item(&item);

        let tiers = ItemTiers {
            schema,
            template,
            metadata,
            quality: assessment.to_tier_result(),
        };
        let result = ItemResult::from_tiers(
            item.reported_id().unwrap_or_default(),
            item.declared_template().map(str::to_string),
            tiers,
            &assessment,
        );

        debug!(
            item_id = %result.item_id,
            is_valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            quality_grade = %result.quality_grade,
            "Validated item"
        );
        Ok(result)
    }
}

impl ItemValidator for ItemPipeline {
    /// Non-object items become a synthetic `VALIDATION_ERROR` result rather
    /// than an error.
    fn validate(&self, item: &Value) -> Result<ItemResult, ItemError> {
        match self.run(item) {
            Err(err @ ItemError::NotAnObject { .. }) => Ok(ItemResult::failure(
                item,
                ValidationIssue::critical(IssueCode::ValidationError, "", err.to_string()),
            )),
            other => other,
        }
    }
}
