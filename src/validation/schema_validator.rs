//! Schema tier: required fields, field types and identifier formats.
//!
//! Every check runs even after an earlier one fails, so authors see all
//! structural problems of an item in one pass.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::issue::{IssueCode, Tier, TierResult, ValidationIssue};
use crate::error::ItemError;
use crate::item::{is_present, json_type_name, QuestionItem, TemplateId};

/// Top-level fields every item must carry.
pub const REQUIRED_FIELDS: [&str; 4] = ["item_id", "template_id", "prompt", "answer_key"];

/// Prompt keys that count as content.
const PROMPT_CONTENT_KEYS: [&str; 6] = ["text", "math", "latex", "diagram", "image", "media"];

/// Keys every misconception entry needs.
const MISCONCEPTION_KEYS: [&str; 3] = ["id", "symptom", "hint"];

fn item_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]{0,127}$").expect("item id pattern is valid")
    })
}

/// Validator for the item schema.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate one raw item against the schema.
    ///
    /// Performs the following validations, in order:
    /// - Required fields present and non-null
    /// - `item_id` is a string matching the identifier pattern
    /// - `template_id` names a known template
    /// - Prompt carries text, math or diagram content
    /// - Optional enrichments, when present, are well-formed (warnings only)
    ///
    /// # Errors
    ///
    /// Returns `ItemError::NotAnObject` if `value` is null or not an object.
    pub fn validate_item(value: &Value) -> Result<TierResult, ItemError> {
        let item = QuestionItem::from_value(value)?;
        let mut result = TierResult::valid(Tier::Schema);

        Self::check_required_fields(&item, &mut result);
        Self::check_item_id(&item, &mut result);
        Self::check_template_id(&item, &mut result);
        Self::check_prompt(&item, &mut result);
        Self::check_worked_solution(&item, &mut result);
        Self::check_misconceptions(&item, &mut result);
        Self::check_interaction_type(&item, &mut result);

        Ok(result)
    }

    /// Check if an item id matches the identifier pattern.
    pub fn is_valid_id(id: &str) -> bool {
        item_id_pattern().is_match(id)
    }

    fn check_required_fields(item: &QuestionItem<'_>, result: &mut TierResult) {
        for field in REQUIRED_FIELDS {
            let present = match field {
                "answer_key" => item.answer_key().is_some(),
                _ => item.field(field).is_some(),
            };
            if !present {
                result.push(ValidationIssue::critical(
                    IssueCode::MissingRequiredField,
                    field,
                    format!("Required field '{}' is missing or null", field),
                ));
            }
        }
    }

    fn check_item_id(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(raw) = item.field("item_id") else {
            return;
        };
        let Some(id) = raw.as_str() else {
            result.push(
                ValidationIssue::critical(
                    IssueCode::InvalidFieldType,
                    "item_id",
                    "item_id must be a string",
                )
                .with_expected("string")
                .with_actual(json_type_name(raw)),
            );
            return;
        };
        if !Self::is_valid_id(id) {
            result.push(
                ValidationIssue::critical(
                    IssueCode::InvalidItemId,
                    "item_id",
                    "item_id must be 1-128 characters of letters, digits, '_', '.', ':' or '-', starting with a letter or digit",
                )
                .with_actual(id),
            );
        }
    }

    fn check_template_id(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(raw) = item.field("template_id") else {
            return;
        };
        let Some(declared) = raw.as_str() else {
            result.push(
                ValidationIssue::critical(
                    IssueCode::InvalidFieldType,
                    "template_id",
                    "template_id must be a string",
                )
                .with_expected("string")
                .with_actual(json_type_name(raw)),
            );
            return;
        };
        if TemplateId::parse(declared).is_none() {
            result.push(
                ValidationIssue::critical(
                    IssueCode::UnknownTemplate,
                    "template_id",
                    format!("Unknown template '{}'", declared),
                )
                .with_expected(TemplateId::known_ids())
                .with_actual(declared),
            );
        }
    }

    fn check_prompt(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(prompt) = item.prompt() else {
            return;
        };
        let has_content = match prompt {
            Value::String(text) => !text.trim().is_empty(),
            Value::Object(fields) => PROMPT_CONTENT_KEYS
                .iter()
                .any(|key| fields.get(*key).is_some_and(is_present)),
            other => {
                result.push(
                    ValidationIssue::critical(
                        IssueCode::InvalidFieldType,
                        "prompt",
                        "prompt must be a string or an object",
                    )
                    .with_expected("string or object")
                    .with_actual(json_type_name(other)),
                );
                return;
            }
        };
        if !has_content {
            result.push(ValidationIssue::critical(
                IssueCode::EmptyPrompt,
                "prompt",
                "Prompt needs text, math or diagram content",
            ));
        }
    }

    fn check_worked_solution(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(solution) = item.field("worked_solution") else {
            return;
        };
        let has_steps = match solution {
            Value::Array(steps) => !steps.is_empty(),
            Value::Object(fields) => fields.get("steps").is_some_and(|s| {
                s.as_array().is_some_and(|steps| steps.iter().any(is_present))
            }),
            _ => false,
        };
        if !has_steps {
            result.push(ValidationIssue::warning(
                IssueCode::EmptyWorkedSolution,
                "worked_solution.steps",
                "Worked solution is present but has no steps",
            ));
        }
    }

    fn check_misconceptions(item: &QuestionItem<'_>, result: &mut TierResult) {
        let Some(raw) = item.field("misconceptions") else {
            return;
        };
        let Some(entries) = raw.as_array() else {
            result.push(
                ValidationIssue::warning(
                    IssueCode::InvalidFieldType,
                    "misconceptions",
                    "misconceptions should be a list",
                )
                .with_expected("array")
                .with_actual(json_type_name(raw)),
            );
            return;
        };

        let mut seen = HashSet::new();
        for (idx, entry) in entries.iter().enumerate() {
            let field = format!("misconceptions[{}]", idx);
            let missing: Vec<&str> = MISCONCEPTION_KEYS
                .iter()
                .copied()
                .filter(|key| !entry.get(*key).is_some_and(is_present))
                .collect();
            if !missing.is_empty() {
                result.push(ValidationIssue::warning(
                    IssueCode::IncompleteMisconception,
                    field.clone(),
                    format!("Misconception is missing: {}", missing.join(", ")),
                ));
            }

            if let Some(id) = entry.get("id").and_then(Value::as_str) {
                let key = id.trim().to_lowercase();
                if !key.is_empty() && !seen.insert(key) {
                    result.push(
                        ValidationIssue::warning(
                            IssueCode::DuplicateMisconception,
                            format!("{}.id", field),
                            format!("Misconception id '{}' appears more than once", id),
                        )
                        .with_actual(id),
                    );
                }
            }
        }
    }

    fn check_interaction_type(item: &QuestionItem<'_>, result: &mut TierResult) {
        let (Some(declared), Some(interaction)) = (item.template_id(), item.interaction_type())
        else {
            return;
        };
        if TemplateId::parse(interaction) != Some(declared) {
            result.push(
                ValidationIssue::warning(
                    IssueCode::InteractionTypeMismatch,
                    "interaction.type",
                    "interaction.type does not match template_id",
                )
                .with_expected(declared.as_str())
                .with_actual(interaction),
            );
        }
    }
}
