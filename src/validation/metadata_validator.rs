//! Metadata tier: cross-checks curriculum references against a [`CurriculumIndex`].

use serde_json::Value;

use super::issue::{IssueCode, Tier, TierResult, ValidationIssue};
use crate::curriculum::CurriculumIndex;
use crate::error::ItemError;
use crate::item::{json_type_name, QuestionItem};

/// Validator for curriculum metadata.
///
/// Curriculum references are advisory: unknown modules, atoms and taxonomy
/// values only produce warnings. Missing telemetry tags are the one blocking
/// condition, since downstream review scheduling depends on them.
pub struct MetadataValidator<'a> {
    index: Option<&'a CurriculumIndex>,
}

impl<'a> MetadataValidator<'a> {
    /// Creates a validator. Without an index every item passes.
    pub fn new(index: Option<&'a CurriculumIndex>) -> Self {
        Self { index }
    }

    /// Validate the metadata of one raw item.
    pub fn validate_item(&self, value: &Value) -> Result<TierResult, ItemError> {
        let item = QuestionItem::from_value(value)?;
        let mut result = TierResult::valid(Tier::Metadata);

        let Some(index) = self.index else {
            return Ok(result);
        };

        Self::check_references(&item, index, &mut result);
        Self::check_taxonomy(&item, index, &mut result);
        Self::check_misconceptions(&item, index, &mut result);
        Self::check_telemetry(&item, index, &mut result);

        Ok(result)
    }

    fn check_references(item: &QuestionItem<'_>, index: &CurriculumIndex, result: &mut TierResult) {
        let module_id = item.module_id();
        match module_id {
            None => result.push(ValidationIssue::warning(
                IssueCode::MissingModuleId,
                "module_id",
                "Item is not assigned to a module",
            )),
            Some(module_id) if !index.has_module(module_id) => result.push(
                ValidationIssue::warning(
                    IssueCode::UnknownModule,
                    "module_id",
                    format!("Module '{}' is not in the curriculum", module_id),
                )
                .with_actual(module_id),
            ),
            Some(_) => {}
        }

        let Some(atom_id) = item.atom_id() else {
            result.push(ValidationIssue::warning(
                IssueCode::MissingAtomId,
                "atom_id",
                "Item is not assigned to an atom",
            ));
            return;
        };
        if !index.has_atom(atom_id) {
            result.push(
                ValidationIssue::warning(
                    IssueCode::UnknownAtom,
                    "atom_id",
                    format!("Atom '{}' is not in the curriculum", atom_id),
                )
                .with_actual(atom_id),
            );
            return;
        }

        if let (Some(owner), Some(module_id)) = (index.atom_module(atom_id), module_id) {
            if owner != module_id {
                result.push(
                    ValidationIssue::warning(
                        IssueCode::AtomModuleMismatch,
                        "atom_id",
                        format!("Atom '{}' belongs to module '{}'", atom_id, owner),
                    )
                    .with_expected(owner)
                    .with_actual(module_id),
                );
            }
        }
    }

    fn check_taxonomy(item: &QuestionItem<'_>, index: &CurriculumIndex, result: &mut TierResult) {
        check_enum(
            item.metadata_value("difficulty"),
            TaxonomyField {
                field: "difficulty",
                label: "Difficulty",
                code: IssueCode::InvalidDifficulty,
                accepted: &index.difficulty_levels,
            },
            |v| index.accepts_difficulty(v),
            result,
        );
        check_enum(
            item.metadata_value("bloom_level"),
            TaxonomyField {
                field: "bloom_level",
                label: "Bloom level",
                code: IssueCode::InvalidBloomLevel,
                accepted: &index.bloom_levels,
            },
            |v| index.accepts_bloom_level(v),
            result,
        );
    }

    fn check_misconceptions(
        item: &QuestionItem<'_>,
        index: &CurriculumIndex,
        result: &mut TierResult,
    ) {
        let Some(misconceptions) = item.misconceptions() else {
            return;
        };
        for (idx, entry) in misconceptions.iter().enumerate() {
            let Some(id) = entry.get("id").and_then(Value::as_str) else {
                continue;
            };
            let id = id.trim();
            if !id.is_empty() && !index.knows_misconception(id) {
                result.push(
                    ValidationIssue::warning(
                        IssueCode::UnknownMisconception,
                        format!("misconceptions[{}].id", idx),
                        format!("Misconception '{}' is not in the curriculum", id),
                    )
                    .with_actual(id),
                );
            }
        }
    }

    fn check_telemetry(item: &QuestionItem<'_>, index: &CurriculumIndex, result: &mut TierResult) {
        if index.require_telemetry && !item.has_telemetry_tags() {
            result.push(ValidationIssue::critical(
                IssueCode::MissingTelemetryTags,
                "telemetry.tags",
                "Item carries no telemetry tags",
            ));
        }
    }
}

/// One enumerated taxonomy field and its accepted labels.
struct TaxonomyField<'a> {
    field: &'static str,
    label: &'static str,
    code: IssueCode,
    accepted: &'a [String],
}

/// Warns when a present taxonomy value is not an accepted label. Values that
/// are not strings can never match and are reported with their JSON rendering.
fn check_enum(
    value: Option<&Value>,
    taxonomy: TaxonomyField<'_>,
    accepts: impl Fn(&str) -> bool,
    result: &mut TierResult,
) {
    let Some(value) = value else {
        return;
    };
    let issue = match value.as_str() {
        Some(label) if accepts(label) => return,
        Some(label) => ValidationIssue::warning(
            taxonomy.code,
            taxonomy.field,
            format!("{} '{}' is not an accepted value", taxonomy.label, label),
        )
        .with_actual(label),
        None => ValidationIssue::warning(
            taxonomy.code,
            taxonomy.field,
            format!(
                "{} must be one of the accepted labels, found {}",
                taxonomy.label,
                json_type_name(value)
            ),
        )
        .with_actual(value.to_string()),
    };
    result.push(issue.with_expected(taxonomy.accepted.join(", ")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> CurriculumIndex {
        CurriculumIndex::new()
            .with_atom("frac-add", "fractions")
            .with_atom("area-rect", "geometry")
            .with_misconception("MC-ADD-DENOM")
    }

    fn item(extra: Value) -> Value {
        let mut value = json!({
            "item_id": "q1",
            "template_id": "mcq",
            "module_id": "fractions",
            "atom_id": "frac-add",
            "telemetry": {"tags": ["fractions.add"]}
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        value
    }

    fn codes(result: &TierResult) -> Vec<IssueCode> {
        result
            .errors
            .iter()
            .chain(result.warnings.iter())
            .map(|i| i.code)
            .collect()
    }

    #[test]
    fn test_passes_without_index() {
        let validator = MetadataValidator::new(None);
        let result = validator.validate_item(&json!({"item_id": "q"})).unwrap();
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_clean_item() {
        let index = index();
        let result = MetadataValidator::new(Some(&index))
            .validate_item(&item(json!({})))
            .unwrap();
        assert!(result.is_valid);
        assert!(codes(&result).is_empty());
    }

    #[test]
    fn test_references_are_warnings() {
        let index = index();
        let validator = MetadataValidator::new(Some(&index));

        let unknown = validator
            .validate_item(&item(json!({"module_id": "algebra", "atom_id": "x-1"})))
            .unwrap();
        assert!(unknown.is_valid);
        assert_eq!(
            codes(&unknown),
            vec![IssueCode::UnknownModule, IssueCode::UnknownAtom]
        );

        let missing = validator
            .validate_item(&item(json!({"module_id": null, "atom_id": " "})))
            .unwrap();
        assert!(missing.is_valid);
        assert_eq!(
            codes(&missing),
            vec![IssueCode::MissingModuleId, IssueCode::MissingAtomId]
        );

        let mismatch = validator
            .validate_item(&item(json!({"module_id": "geometry"})))
            .unwrap();
        assert_eq!(codes(&mismatch), vec![IssueCode::AtomModuleMismatch]);
        assert_eq!(mismatch.warnings[0].expected.as_deref(), Some("fractions"));
    }

    #[test]
    fn test_taxonomy_lists_accepted_values() {
        let index = index();
        let result = MetadataValidator::new(Some(&index))
            .validate_item(&item(json!({
                "difficulty": "extreme",
                "metadata": {"bloom_level": "memorize"}
            })))
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(
            codes(&result),
            vec![IssueCode::InvalidDifficulty, IssueCode::InvalidBloomLevel]
        );
        assert_eq!(
            result.warnings[0].expected.as_deref(),
            Some("easy, medium, hard")
        );
    }

    #[test]
    fn test_non_string_taxonomy_values_are_flagged() {
        let index = index();
        let result = MetadataValidator::new(Some(&index))
            .validate_item(&item(json!({
                "difficulty": 7,
                "metadata": {"bloom_level": ["apply"]}
            })))
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(
            codes(&result),
            vec![IssueCode::InvalidDifficulty, IssueCode::InvalidBloomLevel]
        );
        assert_eq!(result.warnings[0].actual.as_deref(), Some("7"));
        assert_eq!(
            result.warnings[0].expected.as_deref(),
            Some("easy, medium, hard")
        );
        assert_eq!(result.warnings[1].actual.as_deref(), Some("[\"apply\"]"));
        assert!(result.warnings[1].message.contains("array"));
    }

    #[test]
    fn test_unknown_misconception() {
        let index = index();
        let result = MetadataValidator::new(Some(&index))
            .validate_item(&item(json!({
                "misconceptions": [
                    {"id": "MC-ADD-DENOM", "symptom": "s", "hint": "h"},
                    {"id": "MC-OTHER", "symptom": "s", "hint": "h"}
                ]
            })))
            .unwrap();
        assert_eq!(codes(&result), vec![IssueCode::UnknownMisconception]);
        assert_eq!(result.warnings[0].field, "misconceptions[1].id");
    }

    #[test]
    fn test_missing_telemetry_is_critical() {
        let index = index();
        let value = item(json!({"telemetry": {"tags": []}}));
        let result = MetadataValidator::new(Some(&index))
            .validate_item(&value)
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(codes(&result), vec![IssueCode::MissingTelemetryTags]);

        let relaxed = index.with_require_telemetry(false);
        let result = MetadataValidator::new(Some(&relaxed))
            .validate_item(&value)
            .unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn test_rejects_non_object() {
        let index = index();
        assert!(MetadataValidator::new(Some(&index))
            .validate_item(&json!(42))
            .is_err());
    }
}
