//! Template tier: checks an item's payload against its template's contract.
//!
//! The payload is first decoded into [`TemplatePayload`], then the rule set for
//! that variant runs. Rules never stop at the first problem; every violation
//! of the contract is reported.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::issue::{IssueCode, Tier, TierResult, ValidationIssue};
use super::schema_validator::SchemaValidator;
use crate::error::ItemError;
use crate::item::{
    is_present, ChoiceAnswer, ChoiceOption, ChoiceSpec, EquationSpec, FillBlankSpec, MappingSpec,
    NumericSpec, QuestionItem, SequenceSpec, SequenceStep, TemplateFamily, TemplateId,
    TemplatePayload,
};

/// Fewest options a choice item may offer.
pub const MIN_OPTIONS: usize = 2;

/// Most options a choice item may offer.
pub const MAX_OPTIONS: usize = 6;

/// Static contract of one template: the payload fields it relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateContract {
    pub template: TemplateId,
    pub required_payload_fields: &'static [&'static str],
}

impl TemplateContract {
    /// Returns the contract of `template`.
    pub fn for_template(template: TemplateId) -> Self {
        let required_payload_fields: &'static [&'static str] = match template {
            TemplateId::Mcq | TemplateId::MultiSelect => &["options"],
            TemplateId::TwoTier => &["options", "reasons"],
            TemplateId::NumericInput => &[],
            TemplateId::NumberLine => &["min", "max"],
            TemplateId::StepOrder
            | TemplateId::WorkedExample
            | TemplateId::MultiStepWord
            | TemplateId::ErrorAnalysis => &["steps"],
            TemplateId::BalanceOps => &["equation", "operations"],
            TemplateId::Classification => &["items", "bins"],
            TemplateId::Matching => &["left", "right"],
            TemplateId::EquationBalance => &["reactants", "products"],
            TemplateId::FillBlank => &["text"],
        };
        Self {
            template,
            required_payload_fields,
        }
    }

    /// Contracts of every known template.
    pub fn all() -> Vec<Self> {
        TemplateId::ALL
            .iter()
            .map(|t| Self::for_template(*t))
            .collect()
    }

    pub fn family(&self) -> TemplateFamily {
        self.template.family()
    }
}

/// Validator for template contracts.
pub struct TemplateValidator;

impl TemplateValidator {
    /// Validate the payload of one raw item against its template contract.
    ///
    /// An unknown or missing template id yields a failed tier holding a
    /// single `UNKNOWN_TEMPLATE` issue. A `transfer_item`, when present, is
    /// checked too, with its problems reported as warnings.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::NotAnObject` if `value` is null or not an object.
    pub fn validate_item(value: &Value) -> Result<TierResult, ItemError> {
        let item = QuestionItem::from_value(value)?;
        let mut result = Self::validate_contract(&item);
        Self::check_transfer_item(&item, &mut result);
        Ok(result)
    }

    /// The synthetic failure recorded when the template cannot be resolved.
    pub fn unknown_template(declared: Option<&str>) -> TierResult {
        let actual = declared.unwrap_or("<missing>");
        TierResult::failed(
            Tier::Template,
            ValidationIssue::critical(
                IssueCode::UnknownTemplate,
                "template_id",
                format!("Template '{}' is not registered", actual),
            )
            .with_expected(TemplateId::known_ids())
            .with_actual(actual),
        )
    }

    /// Runs the rule set of the payload's template.
    pub fn validate_payload(payload: &TemplatePayload) -> Vec<ValidationIssue> {
        match payload {
            TemplatePayload::Mcq(spec) => single_choice(spec),
            TemplatePayload::TwoTier(spec) => two_tier(spec),
            TemplatePayload::MultiSelect(spec) => multi_select(spec),
            TemplatePayload::NumericInput(spec) => numeric_input(spec),
            TemplatePayload::NumberLine(spec) => number_line(spec),
            TemplatePayload::StepOrder(spec) => step_order(spec),
            TemplatePayload::WorkedExample(spec) => worked_example(spec),
            TemplatePayload::BalanceOps(spec) => balance_ops(spec),
            TemplatePayload::MultiStepWord(spec) => multi_step_word(spec),
            TemplatePayload::ErrorAnalysis(spec) => error_analysis(spec),
            TemplatePayload::Classification(spec) => mapping(spec, &CLASSIFICATION_FIELDS),
            TemplatePayload::Matching(spec) => mapping(spec, &MATCHING_FIELDS),
            TemplatePayload::EquationBalance(spec) => equation_balance(spec),
            TemplatePayload::FillBlank(spec) => fill_blank(spec),
        }
    }

    fn validate_contract(item: &QuestionItem<'_>) -> TierResult {
        let Some(template) = item.template_id() else {
            return Self::unknown_template(item.declared_template());
        };

        let mut result = TierResult::valid(Tier::Template);
        let payload = item.payload();
        if payload.is_none() && !template.payload_optional() {
            let contract = TemplateContract::for_template(template);
            result.push(
                ValidationIssue::critical(
                    IssueCode::MissingPayload,
                    "template_payload",
                    format!("Template '{}' requires a payload", template),
                )
                .with_expected(contract.required_payload_fields.join(", ")),
            );
            return result;
        }

        match TemplatePayload::parse(template, payload, item.answer_key()) {
            Ok(parsed) => result.extend(Self::validate_payload(&parsed)),
            Err(err) => result.push(ValidationIssue::critical(
                IssueCode::InvalidPayload,
                err.field,
                err.to_string(),
            )),
        }
        result
    }

    fn check_transfer_item(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(transfer) = item.field("transfer_item") else {
            return;
        };
        let Ok(nested) = QuestionItem::from_value(transfer) else {
            result.push(ValidationIssue::warning(
                IssueCode::InvalidTransferItem,
                "transfer_item",
                "transfer_item should be an item object",
            ));
            return;
        };

        let mut problems: Vec<ValidationIssue> = Vec::new();
        if let Ok(schema) = SchemaValidator::validate_item(transfer) {
            problems.extend(schema.errors);
        }
        problems.extend(Self::validate_contract(&nested).errors);

        let mut reported = HashSet::new();
        for problem in problems {
            if !reported.insert((problem.code, problem.field.clone())) {
                continue;
            }
            result.push(ValidationIssue::warning(
                IssueCode::InvalidTransferItem,
                format!("transfer_item.{}", problem.field),
                format!("{}: {}", problem.code, problem.message),
            ));
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Choice family
// ---------------------------------------------------------------------------

fn check_options(options: &[ChoiceOption], field: &str, issues: &mut Vec<ValidationIssue>) {
    let count = options.len();
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
        issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidOptionCount,
                field,
                format!(
                    "Expected between {} and {} options, found {}",
                    MIN_OPTIONS, MAX_OPTIONS, count
                ),
            )
            .with_expected(format!("{}-{}", MIN_OPTIONS, MAX_OPTIONS))
            .with_actual(count.to_string()),
        );
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, option) in options.iter().enumerate() {
        let key = normalize(&option.text());
        if key.is_empty() {
            issues.push(ValidationIssue::critical(
                IssueCode::EmptyOptionText,
                format!("{}[{}]", field, idx),
                format!("Option {} has no text", idx),
            ));
            continue;
        }
        match seen.get(&key) {
            Some(first) => issues.push(
                ValidationIssue::critical(
                    IssueCode::DuplicateOption,
                    format!("{}[{}]", field, idx),
                    format!("Option {} duplicates option {}", idx, first),
                )
                .with_actual(option.text().into_owned()),
            ),
            None => {
                seen.insert(key, idx);
            }
        }
    }
}

fn check_single_answer(
    options: &[ChoiceOption],
    answer: &ChoiceAnswer,
    issues: &mut Vec<ValidationIssue>,
) {
    let by_id = |id: &str| options.iter().position(|o| o.id() == Some(id));

    match (answer.correct_index, answer.correct_option_id.as_ref()) {
        (None, None) => issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.correct_index",
            "No correct option declared",
        )),
        (Some(idx), _) if idx >= options.len() => issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidCorrectAnswer,
                "answer_key.correct_index",
                format!("Correct index {} does not refer to an option", idx),
            )
            .with_expected(format!("index below {}", options.len()))
            .with_actual(idx.to_string()),
        ),
        (Some(idx), Some(id)) => {
            if let Some(position) = by_id(id.as_str()) {
                if position != idx {
                    issues.push(ValidationIssue::critical(
                        IssueCode::InvalidCorrectAnswer,
                        "answer_key.correct_option_id",
                        format!(
                            "correct_option_id '{}' is option {}, but correct_index is {}",
                            id.as_str(),
                            position,
                            idx
                        ),
                    ));
                }
            }
        }
        (None, Some(id)) => {
            if by_id(id.as_str()).is_none() {
                issues.push(
                    ValidationIssue::critical(
                        IssueCode::InvalidCorrectAnswer,
                        "answer_key.correct_option_id",
                        format!("No option has id '{}'", id.as_str()),
                    )
                    .with_actual(id.as_str()),
                );
            }
        }
        (Some(_), None) => {}
    }
}

fn single_choice(spec: &ChoiceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_options(&spec.config.options, "template_payload.options", &mut issues);
    check_single_answer(&spec.config.options, &spec.answer, &mut issues);
    issues
}

fn two_tier(spec: &ChoiceSpec) -> Vec<ValidationIssue> {
    let mut issues = single_choice(spec);
    let reasons = &spec.config.reasons;
    check_options(reasons, "template_payload.reasons", &mut issues);

    match spec.answer.correct_reason_index {
        None => issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.correct_reason_index",
            "No correct reason declared",
        )),
        Some(idx) if idx >= reasons.len() => issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidCorrectAnswer,
                "answer_key.correct_reason_index",
                format!("Correct reason index {} does not refer to a reason", idx),
            )
            .with_expected(format!("index below {}", reasons.len()))
            .with_actual(idx.to_string()),
        ),
        Some(_) => {}
    }
    issues
}

fn multi_select(spec: &ChoiceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let options = &spec.config.options;
    check_options(options, "template_payload.options", &mut issues);

    let mut correct = spec.answer.correct_indices.clone();
    if correct.is_empty() {
        correct.extend(spec.answer.correct_index);
    }
    if correct.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.correct_indices",
            "No correct options declared",
        ));
        return issues;
    }

    let mut seen = HashSet::new();
    for idx in correct {
        if idx >= options.len() {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::InvalidCorrectAnswer,
                    "answer_key.correct_indices",
                    format!("Correct index {} does not refer to an option", idx),
                )
                .with_expected(format!("index below {}", options.len()))
                .with_actual(idx.to_string()),
            );
        } else if !seen.insert(idx) {
            issues.push(ValidationIssue::critical(
                IssueCode::InvalidCorrectAnswer,
                "answer_key.correct_indices",
                format!("Correct index {} is listed more than once", idx),
            ));
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Numeric family
// ---------------------------------------------------------------------------

fn numeric_input(spec: &NumericSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if spec.answer.value.is_none() {
        issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.value",
            "No correct numeric value declared",
        ));
    }
    match spec.answer.tolerance {
        None => issues.push(ValidationIssue::warning(
            IssueCode::MissingTolerance,
            "answer_key.tolerance",
            "No tolerance declared; the default tolerance will be applied",
        )),
        Some(tolerance) if tolerance < 0.0 => issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidRange,
                "answer_key.tolerance",
                "Tolerance cannot be negative",
            )
            .with_actual(tolerance.to_string()),
        ),
        Some(_) => {}
    }
    issues
}

fn number_line(spec: &NumericSpec) -> Vec<ValidationIssue> {
    let mut issues = numeric_input(spec);
    let config = &spec.config;

    let (Some(min), Some(max)) = (config.min, config.max) else {
        issues.push(ValidationIssue::critical(
            IssueCode::InvalidRange,
            "template_payload",
            "Number line needs both min and max",
        ));
        return issues;
    };

    if min >= max {
        issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidRange,
                "template_payload.min",
                "min must be less than max",
            )
            .with_actual(format!("min={}, max={}", min, max)),
        );
    }
    if let Some(step) = config.step {
        if step <= 0.0 {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::InvalidRange,
                    "template_payload.step",
                    "step must be positive",
                )
                .with_actual(step.to_string()),
            );
        }
    }
    if let Some(value) = spec.answer.value {
        if min < max && !(min..=max).contains(&value) {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::ValueOutOfRange,
                    "answer_key.value",
                    "Correct value lies outside the number line",
                )
                .with_expected(format!("[{}, {}]", min, max))
                .with_actual(value.to_string()),
            );
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Sequence family
// ---------------------------------------------------------------------------

fn check_steps(steps: &[SequenceStep], field: &str, issues: &mut Vec<ValidationIssue>) {
    if steps.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::EmptySteps,
            field,
            "At least one step is required",
        ));
        return;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for (idx, step) in steps.iter().enumerate() {
        let key = normalize(step.text());
        if key.is_empty() {
            issues.push(ValidationIssue::critical(
                IssueCode::EmptyStepText,
                format!("{}[{}]", field, idx),
                format!("Step {} has no text", idx),
            ));
            continue;
        }
        match seen.get(&key) {
            Some(first) => issues.push(ValidationIssue::warning(
                IssueCode::DuplicateStep,
                format!("{}[{}]", field, idx),
                format!("Step {} repeats step {}", idx, first),
            )),
            None => {
                seen.insert(key, idx);
            }
        }
    }
}

/// Step identifiers: the declared id, or the step's position.
fn step_ids(steps: &[SequenceStep]) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            step.id()
                .map(|id| id.trim().to_string())
                .unwrap_or_else(|| idx.to_string())
        })
        .collect()
}

fn has_final_answer(spec: &SequenceSpec) -> bool {
    [
        &spec.answer.final_answer,
        &spec.answer.value,
        &spec.answer.solution,
    ]
    .into_iter()
    .any(|v| v.as_ref().is_some_and(is_present))
}

fn missing_final_answer() -> ValidationIssue {
    ValidationIssue::warning(
        IssueCode::MissingFinalAnswer,
        "answer_key.final_answer",
        "No final answer declared",
    )
}

fn step_order(spec: &SequenceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let steps = &spec.config.steps;
    check_steps(steps, "template_payload.steps", &mut issues);

    let Some(order) = &spec.answer.correct_order else {
        return issues;
    };
    let ids = step_ids(steps);
    let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut used = HashSet::new();

    for entry in order {
        let id = entry.as_str().trim();
        if !known.contains(id) {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::InvalidStepOrder,
                    "answer_key.correct_order",
                    format!("correct_order references unknown step '{}'", id),
                )
                .with_actual(id),
            );
        } else if !used.insert(id) {
            issues.push(ValidationIssue::critical(
                IssueCode::InvalidStepOrder,
                "answer_key.correct_order",
                format!("Step '{}' appears more than once in correct_order", id),
            ));
        }
    }
    if order.len() != ids.len() {
        issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidStepOrder,
                "answer_key.correct_order",
                "correct_order must list every step exactly once",
            )
            .with_expected(ids.len().to_string())
            .with_actual(order.len().to_string()),
        );
    }
    issues
}

fn worked_example(spec: &SequenceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_steps(&spec.config.steps, "template_payload.steps", &mut issues);
    if !has_final_answer(spec) {
        issues.push(missing_final_answer());
    }
    issues
}

fn balance_ops(spec: &SequenceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let equation_blank = spec
        .config
        .equation
        .as_deref()
        .map_or(true, |e| e.trim().is_empty());
    if equation_blank {
        issues.push(ValidationIssue::critical(
            IssueCode::EmptyEquation,
            "template_payload.equation",
            "Balance operations need a starting equation",
        ));
    }
    check_steps(
        &spec.config.steps,
        "template_payload.operations",
        &mut issues,
    );
    if !has_final_answer(spec) {
        issues.push(missing_final_answer());
    }
    issues
}

fn multi_step_word(spec: &SequenceSpec) -> Vec<ValidationIssue> {
    worked_example(spec)
}

fn error_analysis(spec: &SequenceSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let steps = &spec.config.steps;
    check_steps(steps, "template_payload.steps", &mut issues);

    match spec.answer.error_step_index {
        None => issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.error_step_index",
            "No erroneous step declared",
        )),
        Some(idx) if idx >= steps.len() => issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidCorrectAnswer,
                "answer_key.error_step_index",
                format!("Error step index {} does not refer to a step", idx),
            )
            .with_expected(format!("index below {}", steps.len()))
            .with_actual(idx.to_string()),
        ),
        Some(_) => {}
    }
    issues
}

// ---------------------------------------------------------------------------
// Mapping family
// ---------------------------------------------------------------------------

/// Field names a mapping template uses for its two lists and its answer.
struct MappingFields {
    sources: &'static str,
    targets: &'static str,
    mapping: &'static str,
}

const CLASSIFICATION_FIELDS: MappingFields = MappingFields {
    sources: "template_payload.items",
    targets: "template_payload.bins",
    mapping: "answer_key.mapping",
};

const MATCHING_FIELDS: MappingFields = MappingFields {
    sources: "template_payload.left",
    targets: "template_payload.right",
    mapping: "answer_key.pairs",
};

/// Collects trimmed ids of `entries`, reporting case-insensitive duplicates.
fn collect_ids<'a>(
    entries: impl Iterator<Item = &'a str>,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<String> {
    let mut ids = HashSet::new();
    let mut seen = HashSet::new();
    for (idx, id) in entries.enumerate() {
        let id = id.trim();
        if !seen.insert(id.to_lowercase()) {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::DuplicateItem,
                    format!("{}[{}]", field, idx),
                    format!("Id '{}' is used more than once", id),
                )
                .with_actual(id),
            );
        }
        ids.insert(id.to_string());
    }
    ids
}

fn mapping(spec: &MappingSpec, fields: &MappingFields) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if spec.sources.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::EmptyItemList,
            fields.sources,
            "At least one item is required",
        ));
    }
    if spec.targets.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::EmptyCategoryList,
            fields.targets,
            "At least one category is required",
        ));
    }

    let sources = collect_ids(
        spec.sources.iter().map(|e| e.id.as_str()),
        fields.sources,
        &mut issues,
    );
    let targets = collect_ids(
        spec.targets.iter().map(|e| e.id.as_str()),
        fields.targets,
        &mut issues,
    );

    if spec.mapping.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            fields.mapping,
            "No correct mapping declared",
        ));
        return issues;
    }

    let mut mapped = HashSet::new();
    for (source, target) in &spec.mapping {
        let source = source.trim();
        let target = target.as_str().trim();
        if !sources.contains(source) {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::UnknownMappingItem,
                    format!("{}.{}", fields.mapping, source),
                    format!("Mapping key '{}' is not a listed item", source),
                )
                .with_actual(source),
            );
        } else {
            mapped.insert(source);
        }
        if !targets.contains(target) {
            issues.push(
                ValidationIssue::critical(
                    IssueCode::UnknownMappingTarget,
                    format!("{}.{}", fields.mapping, source),
                    format!("Mapping target '{}' is not a listed category", target),
                )
                .with_actual(target),
            );
        }
    }

    let mut unmapped: Vec<&str> = sources
        .iter()
        .map(String::as_str)
        .filter(|id| !mapped.contains(id))
        .collect();
    unmapped.sort_unstable();
    for id in unmapped {
        issues.push(ValidationIssue::warning(
            IssueCode::UnmappedItem,
            fields.mapping,
            format!("Item '{}' has no correct mapping", id),
        ));
    }
    issues
}

// ---------------------------------------------------------------------------
// Equation and free-text families
// ---------------------------------------------------------------------------

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

fn equation_balance(spec: &EquationSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let config = &spec.config;

    for (field, species) in [
        ("template_payload.reactants", &config.reactants),
        ("template_payload.products", &config.products),
    ] {
        if species.is_empty() || species.iter().any(|s| s.trim().is_empty()) {
            issues.push(ValidationIssue::critical(
                IssueCode::EmptySpecies,
                field,
                "Every side of the equation needs at least one named species",
            ));
        }
    }

    let coefficients = &spec.answer.coefficients;
    if coefficients.is_empty() {
        issues.push(ValidationIssue::critical(
            IssueCode::MissingCorrectAnswer,
            "answer_key.coefficients",
            "No balancing coefficients declared",
        ));
        return issues;
    }

    let species_count = config.reactants.len() + config.products.len();
    if coefficients.len() != species_count {
        issues.push(
            ValidationIssue::critical(
                IssueCode::InvalidCoefficients,
                "answer_key.coefficients",
                "Need exactly one coefficient per species",
            )
            .with_expected(species_count.to_string())
            .with_actual(coefficients.len().to_string()),
        );
    }
    if coefficients.iter().any(|c| *c <= 0) {
        issues.push(ValidationIssue::critical(
            IssueCode::InvalidCoefficients,
            "answer_key.coefficients",
            "Coefficients must be positive integers",
        ));
    } else {
        let divisor = coefficients.iter().fold(0, |acc, c| gcd(acc, *c));
        if divisor > 1 {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::InvalidCoefficients,
                    "answer_key.coefficients",
                    format!("Coefficients share a common factor of {}", divisor),
                )
                .with_actual(divisor.to_string()),
            );
        }
    }
    issues
}

fn blank_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"_{3,}").expect("blank pattern is valid"))
}

fn fill_blank(spec: &FillBlankSpec) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let blank_count = blank_pattern().find_iter(&spec.config.text).count();
    let answers = &spec.answer.blanks;

    if blank_count == 0 {
        issues.push(ValidationIssue::critical(
            IssueCode::BlankCountMismatch,
            "template_payload.text",
            "Text contains no blanks (write blanks as three or more underscores)",
        ));
    } else if answers.len() != blank_count {
        issues.push(
            ValidationIssue::critical(
                IssueCode::BlankCountMismatch,
                "answer_key.blanks",
                "Need one accepted-answer list per blank",
            )
            .with_expected(blank_count.to_string())
            .with_actual(answers.len().to_string()),
        );
    }

    for (idx, blank) in answers.iter().enumerate() {
        if blank.answers().is_empty() {
            issues.push(ValidationIssue::critical(
                IssueCode::EmptyAcceptedAnswers,
                format!("answer_key.blanks[{}]", idx),
                format!("Blank {} has no accepted answers", idx),
            ));
        }
    }
    issues
}
