//! Submission loading and normalisation.
//!
//! A submission is either a bare array of items or a document wrapping an
//! `items` array together with manifest metadata, for example
//! `{schema_version, bank_id, document_type, items: [...]}`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SubmissionError;
use crate::item::json_type_name;

/// Keys under which a document may nest its manifest metadata.
const NESTED_MANIFEST_KEYS: [&str; 3] = ["manifestMetadata", "manifest_metadata", "manifest"];

/// Keys declaring how many items a document should contain.
const DECLARED_COUNT_KEYS: [&str; 4] = ["item_count", "total_items", "itemCount", "totalItems"];

/// Document-level metadata accompanying the items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    /// Item count the document claims to contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_item_count: Option<u64>,
    /// Remaining manifest fields, echoed as submitted.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl Manifest {
    /// Builds a manifest from a document's top-level fields (minus `items`)
    /// merged with any nested manifest object. Nested values win.
    fn from_document(mut document: Map<String, Value>) -> Self {
        let mut fields = Map::new();
        let nested: Vec<Map<String, Value>> = NESTED_MANIFEST_KEYS
            .iter()
            .filter_map(|key| match document.remove(*key) {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect();

        fields.extend(document);
        for map in nested {
            fields.extend(map);
        }

        let schema_version = take_string(&mut fields, "schema_version");
        let bank_id = take_string(&mut fields, "bank_id");
        let document_type = take_string(&mut fields, "document_type");
        let declared_item_count = DECLARED_COUNT_KEYS
            .iter()
            .filter_map(|key| fields.remove(*key))
            .find_map(|v| v.as_u64());

        Self {
            schema_version,
            bank_id,
            document_type,
            declared_item_count,
            fields,
        }
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// A submission normalised to an item list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub items: Vec<Value>,
    /// Present when the submission was a document rather than a bare array.
    pub manifest: Option<Manifest>,
}

impl Submission {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            manifest: None,
        }
    }

    /// Normalises a parsed submission.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::InvalidFormat` when the value is neither an
    /// array nor an object whose `items` field is an array.
    pub fn from_value(value: Value) -> Result<Self, SubmissionError> {
        match value {
            Value::Array(items) => Ok(Self::new(items)),
            Value::Object(mut document) => match document.remove("items") {
                Some(Value::Array(items)) => Ok(Self {
                    items,
                    manifest: Some(Manifest::from_document(document)),
                }),
                Some(other) => Err(SubmissionError::InvalidFormat {
                    found: json_type_name(&other),
                }),
                None => Err(SubmissionError::InvalidFormat {
                    found: "object without 'items'",
                }),
            },
            other => Err(SubmissionError::InvalidFormat {
                found: json_type_name(&other),
            }),
        }
    }

    /// Loads and normalises a `.json`, `.yaml` or `.yml` submission file.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the file cannot be read or parsed, or if
    /// its content is not a valid submission shape.
    pub fn from_path(path: &Path) -> Result<Self, SubmissionError> {
        let value = load_document(path)?;
        let submission = Self::from_value(value)?;
        debug!(
            path = %path.display(),
            items = submission.items.len(),
            has_manifest = submission.manifest.is_some(),
            "Loaded submission"
        );
        Ok(submission)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reads a JSON or YAML file into a JSON value without normalising it.
///
/// # Errors
///
/// Returns `SubmissionError` for unreadable files, unknown extensions and
/// parse failures.
pub fn load_document(path: &Path) -> Result<Value, SubmissionError> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
        _ => Err(SubmissionError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_bare_array() {
        let submission = Submission::from_value(json!([{"item_id": "a"}, {"item_id": "b"}])).unwrap();
        assert_eq!(submission.len(), 2);
        assert!(submission.manifest.is_none());
    }

    #[test]
    fn test_document_with_manifest() {
        let submission = Submission::from_value(json!({
            "schema_version": "2.1",
            "bank_id": "algebra-bank",
            "document_type": "question_bank",
            "manifestMetadata": {"item_count": 3, "author": "curriculum team"},
            "items": [{"item_id": "a"}]
        }))
        .unwrap();

        let manifest = submission.manifest.unwrap();
        assert_eq!(manifest.schema_version.as_deref(), Some("2.1"));
        assert_eq!(manifest.bank_id.as_deref(), Some("algebra-bank"));
        assert_eq!(manifest.document_type.as_deref(), Some("question_bank"));
        assert_eq!(manifest.declared_item_count, Some(3));
        assert_eq!(manifest.fields["author"], "curriculum team");
        assert_eq!(submission.items.len(), 1);
    }

    #[test]
    fn test_invalid_shapes() {
        for value in [json!("items"), json!(7), json!(null), json!({"questions": []}), json!({"items": {}})] {
            assert!(
                matches!(
                    Submission::from_value(value.clone()),
                    Err(SubmissionError::InvalidFormat { .. })
                ),
                "{}",
                value
            );
        }
    }

    #[test]
    fn test_manifest_serializes_camel_case() {
        let manifest = Manifest::from_document(
            json!({"bank_id": "b1", "total_items": 2})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["bankId"], "b1");
        assert_eq!(json["declaredItemCount"], 2);
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn test_load_yaml_and_json_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "items:\n  - item_id: q1\n    template_id: mcq").unwrap();
        let submission = Submission::from_path(yaml.path()).unwrap();
        assert_eq!(submission.items[0]["template_id"], "mcq");

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json_file, "[{{\"item_id\": \"q1\"}}]").unwrap();
        assert_eq!(Submission::from_path(json_file.path()).unwrap().len(), 1);

        let other = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        assert!(matches!(
            Submission::from_path(other.path()),
            Err(SubmissionError::UnsupportedFormat(_))
        ));
    }
}
