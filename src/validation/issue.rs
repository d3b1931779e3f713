//! Structured validation issues and per-tier results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Blocks publication of the item.
    Critical,
    /// Advisory; does not block.
    Warning,
    /// Observation only, mostly batch-level.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        f.write_str(name)
    }
}

/// Machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // Schema tier
    MissingRequiredField,
    InvalidFieldType,
    InvalidItemId,
    UnknownTemplate,
    EmptyPrompt,
    EmptyWorkedSolution,
    IncompleteMisconception,
    DuplicateMisconception,
    InteractionTypeMismatch,

    // Template tier
    MissingPayload,
    InvalidPayload,
    InvalidOptionCount,
    EmptyOptionText,
    DuplicateOption,
    MissingCorrectAnswer,
    InvalidCorrectAnswer,
    MissingTolerance,
    InvalidRange,
    ValueOutOfRange,
    EmptySteps,
    EmptyStepText,
    DuplicateStep,
    InvalidStepOrder,
    MissingFinalAnswer,
    EmptyEquation,
    EmptyItemList,
    EmptyCategoryList,
    DuplicateItem,
    UnknownMappingItem,
    UnknownMappingTarget,
    UnmappedItem,
    EmptySpecies,
    InvalidCoefficients,
    BlankCountMismatch,
    EmptyAcceptedAnswers,
    InvalidTransferItem,

    // Metadata tier
    MissingModuleId,
    UnknownModule,
    MissingAtomId,
    UnknownAtom,
    AtomModuleMismatch,
    InvalidDifficulty,
    InvalidBloomLevel,
    UnknownMisconception,
    MissingTelemetryTags,

    // Quality tier
    MissingMisconceptions,
    MissingWorkedSolution,
    MissingFeedbackMap,
    MissingTransferItem,

    // Task boundary and batch level
    ValidationError,
    ValidationTimeout,
    ValidationCancelled,
    DuplicateItemIds,
    CoverageGap,
    ItemCountMismatch,
    NoQuestionsToValidate,
    InvalidFormat,
    BatchCancelled,
}

impl IssueCode {
    /// Returns the wire form of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            IssueCode::InvalidFieldType => "INVALID_FIELD_TYPE",
            IssueCode::InvalidItemId => "INVALID_ITEM_ID",
            IssueCode::UnknownTemplate => "UNKNOWN_TEMPLATE",
            IssueCode::EmptyPrompt => "EMPTY_PROMPT",
            IssueCode::EmptyWorkedSolution => "EMPTY_WORKED_SOLUTION",
            IssueCode::IncompleteMisconception => "INCOMPLETE_MISCONCEPTION",
            IssueCode::DuplicateMisconception => "DUPLICATE_MISCONCEPTION",
            IssueCode::InteractionTypeMismatch => "INTERACTION_TYPE_MISMATCH",
            IssueCode::MissingPayload => "MISSING_PAYLOAD",
            IssueCode::InvalidPayload => "INVALID_PAYLOAD",
            IssueCode::InvalidOptionCount => "INVALID_OPTION_COUNT",
            IssueCode::EmptyOptionText => "EMPTY_OPTION_TEXT",
            IssueCode::DuplicateOption => "DUPLICATE_OPTION",
            IssueCode::MissingCorrectAnswer => "MISSING_CORRECT_ANSWER",
            IssueCode::InvalidCorrectAnswer => "INVALID_CORRECT_ANSWER",
            IssueCode::MissingTolerance => "MISSING_TOLERANCE",
            IssueCode::InvalidRange => "INVALID_RANGE",
            IssueCode::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            IssueCode::EmptySteps => "EMPTY_STEPS",
            IssueCode::EmptyStepText => "EMPTY_STEP_TEXT",
            IssueCode::DuplicateStep => "DUPLICATE_STEP",
            IssueCode::InvalidStepOrder => "INVALID_STEP_ORDER",
            IssueCode::MissingFinalAnswer => "MISSING_FINAL_ANSWER",
            IssueCode::EmptyEquation => "EMPTY_EQUATION",
            IssueCode::EmptyItemList => "EMPTY_ITEM_LIST",
            IssueCode::EmptyCategoryList => "EMPTY_CATEGORY_LIST",
            IssueCode::DuplicateItem => "DUPLICATE_ITEM",
            IssueCode::UnknownMappingItem => "UNKNOWN_MAPPING_ITEM",
            IssueCode::UnknownMappingTarget => "UNKNOWN_MAPPING_TARGET",
            IssueCode::UnmappedItem => "UNMAPPED_ITEM",
            IssueCode::EmptySpecies => "EMPTY_SPECIES",
            IssueCode::InvalidCoefficients => "INVALID_COEFFICIENTS",
            IssueCode::BlankCountMismatch => "BLANK_COUNT_MISMATCH",
            IssueCode::EmptyAcceptedAnswers => "EMPTY_ACCEPTED_ANSWERS",
            IssueCode::InvalidTransferItem => "INVALID_TRANSFER_ITEM",
            IssueCode::MissingModuleId => "MISSING_MODULE_ID",
            IssueCode::UnknownModule => "UNKNOWN_MODULE",
            IssueCode::MissingAtomId => "MISSING_ATOM_ID",
            IssueCode::UnknownAtom => "UNKNOWN_ATOM",
            IssueCode::AtomModuleMismatch => "ATOM_MODULE_MISMATCH",
            IssueCode::InvalidDifficulty => "INVALID_DIFFICULTY",
            IssueCode::InvalidBloomLevel => "INVALID_BLOOM_LEVEL",
            IssueCode::UnknownMisconception => "UNKNOWN_MISCONCEPTION",
            IssueCode::MissingTelemetryTags => "MISSING_TELEMETRY_TAGS",
            IssueCode::MissingMisconceptions => "MISSING_MISCONCEPTIONS",
            IssueCode::MissingWorkedSolution => "MISSING_WORKED_SOLUTION",
            IssueCode::MissingFeedbackMap => "MISSING_FEEDBACK_MAP",
            IssueCode::MissingTransferItem => "MISSING_TRANSFER_ITEM",
            IssueCode::ValidationError => "VALIDATION_ERROR",
            IssueCode::ValidationTimeout => "VALIDATION_TIMEOUT",
            IssueCode::ValidationCancelled => "VALIDATION_CANCELLED",
            IssueCode::DuplicateItemIds => "DUPLICATE_ITEM_IDS",
            IssueCode::CoverageGap => "COVERAGE_GAP",
            IssueCode::ItemCountMismatch => "ITEM_COUNT_MISMATCH",
            IssueCode::NoQuestionsToValidate => "NO_QUESTIONS_TO_VALIDATE",
            IssueCode::InvalidFormat => "INVALID_FORMAT",
            IssueCode::BatchCancelled => "BATCH_CANCELLED",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found by a validator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    /// Dotted path of the offending field, or empty for whole-item issues.
    pub field: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            field: field.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn critical(code: IssueCode, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, code, field, message)
    }

    pub fn warning(code: IssueCode, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, field, message)
    }

    pub fn info(code: IssueCode, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, field, message)
    }

    /// Attaches the expected value.
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Attaches the actual value.
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
        } else {
            write!(
                f,
                "[{}] {} ({}): {}",
                self.severity, self.code, self.field, self.message
            )
        }
    }
}

/// The four stages of the per-item pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Schema,
    Template,
    Metadata,
    Quality,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Schema => "schema",
            Tier::Template => "template",
            Tier::Metadata => "metadata",
            Tier::Quality => "quality",
        };
        f.write_str(name)
    }
}

/// Outcome of one tier for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierResult {
    pub tier: Tier,
    /// False as soon as one CRITICAL issue is recorded.
    pub is_valid: bool,
    /// CRITICAL issues.
    pub errors: Vec<ValidationIssue>,
    /// WARNING and INFO issues.
    pub warnings: Vec<ValidationIssue>,
}

impl TierResult {
    /// Creates a passing result with no issues.
    pub fn valid(tier: Tier) -> Self {
        Self {
            tier,
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Creates a failed result holding a single issue.
    pub fn failed(tier: Tier, issue: ValidationIssue) -> Self {
        let mut result = Self::valid(tier);
        result.push(issue);
        result.is_valid = false;
        result
    }

    /// Records an issue, routing it by severity.
    pub fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Critical => {
                self.errors.push(issue);
                self.is_valid = false;
            }
            Severity::Warning | Severity::Info => self.warnings.push(issue),
        }
    }

    /// Records several issues.
    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    /// Whether any issue carries `code`.
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .any(|i| i.code == code)
    }
}
