//! Read-only typed view over a raw question item.

use serde_json::{Map, Value};

use super::template::TemplateId;
use crate::error::ItemError;

/// Borrowed view over one item of a submission.
///
/// Items are kept as raw JSON so the schema tier can report on exactly what
/// was submitted; this view centralises the field lookups (including the
/// fallbacks between `template_payload` and `interaction.config`) so every
/// tier reads the item the same way. Validators never mutate items.
#[derive(Debug, Clone, Copy)]
pub struct QuestionItem<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> QuestionItem<'a> {
    /// Wraps a raw item, rejecting null and non-object values.
    pub fn from_value(value: &'a Value) -> Result<Self, ItemError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ItemError::NotAnObject {
                found: json_type_name(other),
            }),
        }
    }

    /// Returns a top-level field, treating explicit `null` as absent.
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Returns a top-level field as a string, if it is one.
    pub fn str_field(&self, name: &str) -> Option<&'a str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn item_id(&self) -> Option<&'a str> {
        self.str_field("item_id")
    }

    /// The id used to identify the item in reports and duplicate grouping.
    ///
    /// Strings are kept as declared; numbers and booleans are rendered so a
    /// mistyped id still names its item. Arrays and objects yield `None`.
    pub fn reported_id(&self) -> Option<String> {
        match self.field("item_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// The template id exactly as declared.
    pub fn declared_template(&self) -> Option<&'a str> {
        self.str_field("template_id")
    }

    /// The declared template, if it names a known one.
    pub fn template_id(&self) -> Option<TemplateId> {
        self.declared_template().and_then(TemplateId::parse)
    }

    pub fn module_id(&self) -> Option<&'a str> {
        self.str_field("module_id").filter(|s| !s.trim().is_empty())
    }

    pub fn atom_id(&self) -> Option<&'a str> {
        self.str_field("atom_id").filter(|s| !s.trim().is_empty())
    }

    pub fn prompt(&self) -> Option<&'a Value> {
        self.field("prompt")
    }

    pub fn interaction(&self) -> Option<&'a Value> {
        self.field("interaction")
    }

    /// `interaction.type`, when declared.
    pub fn interaction_type(&self) -> Option<&'a str> {
        self.interaction()
            .and_then(|i| i.get("type"))
            .and_then(Value::as_str)
    }

    /// Template payload: `template_payload`, else `interaction.config`.
    pub fn payload(&self) -> Option<&'a Value> {
        self.field("template_payload").or_else(|| {
            self.interaction()
                .and_then(|i| i.get("config"))
                .filter(|v| !v.is_null())
        })
    }

    /// Answer key: top-level `answer_key`, else one nested in the payload.
    pub fn answer_key(&self) -> Option<&'a Value> {
        self.field("answer_key").or_else(|| {
            self.payload()
                .and_then(|p| p.get("answer_key"))
                .filter(|v| !v.is_null())
        })
    }

    /// Reads a taxonomy value from the top level or from `metadata`,
    /// whatever its JSON type.
    pub fn metadata_value(&self, key: &str) -> Option<&'a Value> {
        self.field(key).or_else(|| {
            self.field("metadata")
                .and_then(|m| m.get(key))
                .filter(|v| !v.is_null())
        })
    }

    /// [`metadata_value`](Self::metadata_value) as a string, if it is one.
    pub fn metadata_str(&self, key: &str) -> Option<&'a str> {
        self.metadata_value(key).and_then(Value::as_str)
    }

    /// Misconceptions as a list, if present in list form.
    pub fn misconceptions(&self) -> Option<&'a Vec<Value>> {
        self.field("misconceptions").and_then(Value::as_array)
    }

    /// Telemetry tags from `telemetry.tags`, `telemetry.diagnostic_tags`,
    /// a bare `telemetry` list, or `telemetry_tags`. Empty strings are dropped.
    pub fn telemetry_tags(&self) -> Vec<&'a str> {
        let mut tags = Vec::new();
        let mut collect = |value: Option<&'a Value>| {
            if let Some(list) = value.and_then(Value::as_array) {
                tags.extend(
                    list.iter()
                        .filter_map(Value::as_str)
                        .filter(|t| !t.trim().is_empty()),
                );
            }
        };

        if let Some(telemetry) = self.field("telemetry") {
            if telemetry.is_array() {
                collect(Some(telemetry));
            } else {
                collect(telemetry.get("tags"));
                collect(telemetry.get("diagnostic_tags"));
            }
        }
        collect(self.field("telemetry_tags"));
        tags
    }

    /// Whether an optional enrichment is present and non-empty.
    pub fn has_enrichment(&self, name: &str) -> bool {
        self.field(name).is_some_and(is_present)
    }

    /// Whether the item carries at least one telemetry tag.
    pub fn has_telemetry_tags(&self) -> bool {
        !self.telemetry_tags().is_empty()
    }
}

/// Whether a value carries content: non-null, and non-empty when it is a
/// string, array or object.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Human-readable JSON type name for messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reported_id_renders_scalars() {
        let ids: Vec<Option<String>> = [
            json!({"item_id": "q-1"}),
            json!({"item_id": 7}),
            json!({"item_id": 2.5}),
            json!({"item_id": ["q"]}),
            json!({"item_id": null}),
        ]
        .iter()
        .map(|v| QuestionItem::from_value(v).unwrap().reported_id())
        .collect();
        assert_eq!(
            ids,
            vec![Some("q-1".into()), Some("7".into()), Some("2.5".into()), None, None]
        );
    }

    #[test]
    fn test_rejects_non_objects() {
        let err = QuestionItem::from_value(&Value::Null).unwrap_err();
        assert!(matches!(err, ItemError::NotAnObject { found: "null" }));

        let value = json!(["not", "an", "item"]);
        assert!(QuestionItem::from_value(&value).is_err());
    }

    #[test]
    fn test_payload_falls_back_to_interaction_config() {
        let value = json!({
            "item_id": "Q1",
            "interaction": {"type": "mcq", "config": {"options": ["a", "b"]}}
        });
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.interaction_type(), Some("mcq"));
        assert_eq!(item.payload().unwrap()["options"][1], "b");
    }

    #[test]
    fn test_template_payload_takes_precedence() {
        let value = json!({
            "template_payload": {"options": ["x"]},
            "interaction": {"config": {"options": ["y"]}}
        });
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.payload().unwrap()["options"][0], "x");
    }

    #[test]
    fn test_answer_key_nested_in_payload() {
        let value = json!({
            "template_payload": {"answer_key": {"value": 4}}
        });
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.answer_key().unwrap()["value"], 4);
    }

    #[test]
    fn test_telemetry_tag_sources() {
        let value = json!({
            "telemetry": {"tags": ["fractions"], "diagnostic_tags": ["", "sign-error"]},
            "telemetry_tags": ["review"]
        });
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.telemetry_tags(), vec!["fractions", "sign-error", "review"]);

        let bare = json!({"telemetry": ["t1"]});
        let item = QuestionItem::from_value(&bare).unwrap();
        assert!(item.has_telemetry_tags());

        let none = json!({"telemetry": {}});
        let item = QuestionItem::from_value(&none).unwrap();
        assert!(!item.has_telemetry_tags());
    }

    #[test]
    fn test_metadata_lookup_falls_back_to_metadata_object() {
        let value = json!({"metadata": {"difficulty": "hard"}, "bloom_level": "apply"});
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.metadata_str("difficulty"), Some("hard"));
        assert_eq!(item.metadata_str("bloom_level"), Some("apply"));
    }

    #[test]
    fn test_is_present() {
        assert!(!is_present(&json!(null)));
        assert!(!is_present(&json!("  ")));
        assert!(!is_present(&json!([])));
        assert!(!is_present(&json!({})));
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!({"k": 1})));
    }

    #[test]
    fn test_blank_ids_are_absent() {
        let value = json!({"module_id": " ", "atom_id": "atom-1"});
        let item = QuestionItem::from_value(&value).unwrap();
        assert_eq!(item.module_id(), None);
        assert_eq!(item.atom_id(), Some("atom-1"));
    }
}
