//! Curriculum reference data.
//!
//! A [`CurriculumIndex`] is supplied by the caller (usually loaded once from a
//! JSON or YAML export of the curriculum service) and shared read-only by every
//! validation task of a batch. Nothing in this crate caches it globally.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CurriculumError;

/// Accepted difficulty labels when the index does not override them.
pub const DEFAULT_DIFFICULTY_LEVELS: [&str; 3] = ["easy", "medium", "hard"];

/// Accepted Bloom's taxonomy levels when the index does not override them.
pub const DEFAULT_BLOOM_LEVELS: [&str; 6] = [
    "remember",
    "understand",
    "apply",
    "analyze",
    "evaluate",
    "create",
];

/// Valid curriculum references and taxonomy values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumIndex {
    /// Known module ids.
    pub modules: BTreeSet<String>,
    /// Known atom ids mapped to their owning module, when known.
    pub atoms: BTreeMap<String, Option<String>>,
    /// Accepted difficulty labels.
    pub difficulty_levels: Vec<String>,
    /// Accepted Bloom levels.
    pub bloom_levels: Vec<String>,
    /// Known misconception ids. Empty means misconceptions are not checked.
    pub misconception_ids: BTreeSet<String>,
    /// Whether items must carry telemetry tags.
    pub require_telemetry: bool,
}

impl Default for CurriculumIndex {
    fn default() -> Self {
        Self {
            modules: BTreeSet::new(),
            atoms: BTreeMap::new(),
            difficulty_levels: DEFAULT_DIFFICULTY_LEVELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bloom_levels: DEFAULT_BLOOM_LEVELS.iter().map(|s| s.to_string()).collect(),
            misconception_ids: BTreeSet::new(),
            require_telemetry: true,
        }
    }
}

impl CurriculumIndex {
    /// Creates an empty index with default taxonomy values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an index from a `.json`, `.yaml` or `.yml` file.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` if the file cannot be read, does not parse,
    /// or declares empty taxonomy lists.
    pub fn from_path(path: &Path) -> Result<Self, CurriculumError> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let index: Self = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => return Err(CurriculumError::UnsupportedFormat(path.to_path_buf())),
        };

        let index = index.normalized();
        index.validate()?;

        debug!(
            path = %path.display(),
            modules = index.modules.len(),
            atoms = index.atoms.len(),
            "Loaded curriculum index"
        );
        Ok(index)
    }

    /// Registers every module referenced by an atom as a known module.
    pub fn normalized(mut self) -> Self {
        let owners: Vec<String> = self.atoms.values().flatten().cloned().collect();
        self.modules.extend(owners);
        self
    }

    /// Checks that the taxonomy lists are usable.
    pub fn validate(&self) -> Result<(), CurriculumError> {
        if self.difficulty_levels.is_empty() {
            return Err(CurriculumError::Inconsistent(
                "difficulty_levels cannot be empty".to_string(),
            ));
        }
        if self.bloom_levels.is_empty() {
            return Err(CurriculumError::Inconsistent(
                "bloom_levels cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder method to add a module.
    pub fn with_module(mut self, module_id: impl Into<String>) -> Self {
        self.modules.insert(module_id.into());
        self
    }

    /// Builder method to add an atom owned by `module_id`.
    pub fn with_atom(mut self, atom_id: impl Into<String>, module_id: impl Into<String>) -> Self {
        let module_id = module_id.into();
        self.modules.insert(module_id.clone());
        self.atoms.insert(atom_id.into(), Some(module_id));
        self
    }

    /// Builder method to add a misconception id.
    pub fn with_misconception(mut self, misconception_id: impl Into<String>) -> Self {
        self.misconception_ids.insert(misconception_id.into());
        self
    }

    /// Builder method to set whether telemetry tags are required.
    pub fn with_require_telemetry(mut self, required: bool) -> Self {
        self.require_telemetry = required;
        self
    }

    pub fn has_module(&self, module_id: &str) -> bool {
        self.modules.contains(module_id)
    }

    pub fn has_atom(&self, atom_id: &str) -> bool {
        self.atoms.contains_key(atom_id)
    }

    /// Returns the module owning `atom_id`, when the index records one.
    pub fn atom_module(&self, atom_id: &str) -> Option<&str> {
        self.atoms.get(atom_id).and_then(|m| m.as_deref())
    }

    /// Atoms owned by `module_id`.
    pub fn atoms_in_module<'a>(&'a self, module_id: &'a str) -> impl Iterator<Item = &'a str> {
        self.atoms
            .iter()
            .filter(move |(_, owner)| owner.as_deref() == Some(module_id))
            .map(|(atom, _)| atom.as_str())
    }

    /// Case-insensitive membership test for difficulty labels.
    pub fn accepts_difficulty(&self, value: &str) -> bool {
        contains_ignore_case(&self.difficulty_levels, value)
    }

    /// Case-insensitive membership test for Bloom levels.
    pub fn accepts_bloom_level(&self, value: &str) -> bool {
        contains_ignore_case(&self.bloom_levels, value)
    }

    /// Whether a misconception id is acceptable. Always true when the index
    /// lists no misconceptions.
    pub fn knows_misconception(&self, misconception_id: &str) -> bool {
        self.misconception_ids.is_empty() || self.misconception_ids.contains(misconception_id)
    }
}

fn contains_ignore_case(values: &[String], candidate: &str) -> bool {
    let candidate = candidate.trim();
    values.iter().any(|v| v.eq_ignore_ascii_case(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_taxonomy() {
        let index = CurriculumIndex::new();
        assert!(index.accepts_difficulty("Medium"));
        assert!(!index.accepts_difficulty("extreme"));
        assert!(index.accepts_bloom_level(" analyze "));
        assert!(index.require_telemetry);
    }

    #[test]
    fn test_builder_registers_atom_modules() {
        let index = CurriculumIndex::new()
            .with_atom("frac-add", "fractions")
            .with_atom("frac-sub", "fractions")
            .with_module("geometry");

        assert!(index.has_module("fractions"));
        assert!(index.has_atom("frac-add"));
        assert_eq!(index.atom_module("frac-sub"), Some("fractions"));
        let mut atoms: Vec<_> = index.atoms_in_module("fractions").collect();
        atoms.sort();
        assert_eq!(atoms, vec!["frac-add", "frac-sub"]);
        assert_eq!(index.atoms_in_module("geometry").count(), 0);
    }

    #[test]
    fn test_misconceptions_unchecked_when_empty() {
        let index = CurriculumIndex::new();
        assert!(index.knows_misconception("anything"));

        let index = index.with_misconception("mc-1");
        assert!(index.knows_misconception("mc-1"));
        assert!(!index.knows_misconception("mc-2"));
    }

    #[test]
    fn test_load_json_normalizes_modules() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"atoms": {{"a1": "m1", "a2": null}}, "require_telemetry": false}}"#
        )
        .unwrap();

        let index = CurriculumIndex::from_path(file.path()).unwrap();
        assert!(index.has_module("m1"));
        assert!(index.has_atom("a2"));
        assert_eq!(index.atom_module("a2"), None);
        assert!(!index.require_telemetry);
        assert_eq!(index.difficulty_levels.len(), 3);
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "modules: [m1]\ndifficulty_levels: [intro, core]").unwrap();

        let index = CurriculumIndex::from_path(file.path()).unwrap();
        assert!(index.has_module("m1"));
        assert!(index.accepts_difficulty("core"));
        assert!(!index.accepts_difficulty("easy"));
    }

    #[test]
    fn test_rejects_unknown_extension_and_empty_taxonomy() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            CurriculumIndex::from_path(file.path()),
            Err(CurriculumError::UnsupportedFormat(_))
        ));

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"bloom_levels": []}}"#).unwrap();
        assert!(matches!(
            CurriculumIndex::from_path(file.path()),
            Err(CurriculumError::Inconsistent(_))
        ));
    }
}
