//! Batch-only analyses: properties of the item set rather than of any one item.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::input::Manifest;
use super::report::GlobalIssue;
use crate::curriculum::CurriculumIndex;
use crate::error::SubmissionError;
use crate::item::QuestionItem;
use crate::validation::{IssueCode, ValidationIssue};

/// Atoms whose item count falls below this share of the batch average are
/// reported as coverage gaps.
pub const COVERAGE_GAP_RATIO: f64 = 0.5;

/// Item counts per template, module and atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub templates: BTreeMap<String, usize>,
    pub modules: BTreeMap<String, usize>,
    pub atoms: BTreeMap<String, usize>,
}

impl CoverageStats {
    /// Counts the declared template, module and atom of every object item.
    pub fn from_items(items: &[Value]) -> Self {
        let mut stats = Self::default();
        for item in items.iter().filter_map(|v| QuestionItem::from_value(v).ok()) {
            if let Some(template) = item.declared_template() {
                *stats.templates.entry(template.to_string()).or_default() += 1;
            }
            if let Some(module) = item.module_id() {
                *stats.modules.entry(module.to_string()).or_default() += 1;
            }
            if let Some(atom) = item.atom_id() {
                *stats.atoms.entry(atom.to_string()).or_default() += 1;
            }
        }
        stats
    }
}

/// One CRITICAL issue listing every item id used more than once.
///
/// `occurrences` maps each item id to the input indices carrying it.
pub fn duplicate_ids(occurrences: &BTreeMap<String, Vec<usize>>) -> Option<GlobalIssue> {
    let duplicates: Vec<(&String, &Vec<usize>)> = occurrences
        .iter()
        .filter(|(_, indices)| indices.len() > 1)
        .collect();
    if duplicates.is_empty() {
        return None;
    }

    let summary: Vec<String> = duplicates
        .iter()
        .map(|(id, indices)| format!("{} ({})", id, indices.len()))
        .collect();
    let details: Vec<Value> = duplicates
        .iter()
        .map(|(id, indices)| {
            json!({
                "itemId": id,
                "count": indices.len(),
                "indices": indices,
            })
        })
        .collect();

    let issue = ValidationIssue::critical(
        IssueCode::DuplicateItemIds,
        "item_id",
        format!(
            "{} item id(s) used more than once: {}",
            duplicates.len(),
            summary.join(", ")
        ),
    );
    Some(GlobalIssue::new(issue).with_detail("duplicateIds", Value::Array(details)))
}

/// INFO issues for atoms whose item count is below half the batch average.
///
/// With a curriculum index, atoms of the batch's modules that received no
/// items at all take part in the average and can be reported too.
pub fn coverage_gaps(stats: &CoverageStats, index: Option<&CurriculumIndex>) -> Vec<GlobalIssue> {
    let mut counts = stats.atoms.clone();
    if let Some(index) = index {
        for module in stats.modules.keys() {
            for atom in index.atoms_in_module(module) {
                counts.entry(atom.to_string()).or_insert(0);
            }
        }
    }
    if counts.is_empty() {
        return Vec::new();
    }

    let total: usize = counts.values().sum();
    let average = total as f64 / counts.len() as f64;
    let threshold = average * COVERAGE_GAP_RATIO;

    counts
        .iter()
        .filter(|(_, count)| (**count as f64) < threshold)
        .map(|(atom, count)| {
            let rounded = (average * 100.0).round() / 100.0;
            let issue = ValidationIssue::info(
                IssueCode::CoverageGap,
                "atom_id",
                format!(
                    "Atom '{}' has {} item(s), below half the batch average of {:.2}",
                    atom, count, average
                ),
            )
            .with_expected(format!(">= {:.2}", threshold))
            .with_actual(count.to_string());
            GlobalIssue::new(issue)
                .with_detail("atomId", json!(atom))
                .with_detail("count", json!(count))
                .with_detail("average", json!(rounded))
        })
        .collect()
}

/// WARNING when the manifest declares a different item count than submitted.
pub fn item_count_mismatch(manifest: Option<&Manifest>, actual: usize) -> Option<GlobalIssue> {
    let declared = manifest?.declared_item_count?;
    if declared == actual as u64 {
        return None;
    }
    let issue = ValidationIssue::warning(
        IssueCode::ItemCountMismatch,
        "items",
        format!(
            "Manifest declares {} item(s) but the submission contains {}",
            declared, actual
        ),
    )
    .with_expected(declared.to_string())
    .with_actual(actual.to_string());
    Some(GlobalIssue::new(issue))
}

/// INFO issue for a submission without items.
pub fn no_questions() -> GlobalIssue {
    GlobalIssue::new(ValidationIssue::info(
        IssueCode::NoQuestionsToValidate,
        "items",
        "Submission contains no items to validate",
    ))
}

/// CRITICAL issue for input that is not a recognised submission shape.
pub fn invalid_format(err: &SubmissionError) -> GlobalIssue {
    GlobalIssue::new(
        ValidationIssue::critical(IssueCode::InvalidFormat, "", err.to_string())
            .with_expected("array of items or object with an 'items' array"),
    )
}

/// WARNING issue for a batch stopped before every item was validated.
pub fn batch_cancelled(unprocessed: usize, total: usize) -> GlobalIssue {
    GlobalIssue::new(ValidationIssue::warning(
        IssueCode::BatchCancelled,
        "",
        format!(
            "Batch was cancelled; {} of {} item(s) were not validated",
            unprocessed, total
        ),
    ))
    .with_detail("unprocessedItems", json!(unprocessed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(entries: &[(&str, &[usize])]) -> BTreeMap<String, Vec<usize>> {
        entries
            .iter()
            .map(|(id, idx)| (id.to_string(), idx.to_vec()))
            .collect()
    }

    #[test]
    fn test_duplicate_ids_single_issue() {
        let occ = occurrences(&[("Q1", &[0, 2]), ("Q2", &[1]), ("Q3", &[3, 4, 5])]);
        let issue = duplicate_ids(&occ).unwrap();
        assert_eq!(issue.issue.code, IssueCode::DuplicateItemIds);
        assert!(issue.issue.is_critical());

        let listed = issue.details["duplicateIds"].as_array().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0]["itemId"], "Q1");
        assert_eq!(listed[0]["count"], 2);
        assert_eq!(listed[0]["indices"], json!([0, 2]));
        assert_eq!(listed[1]["count"], 3);
    }

    #[test]
    fn test_unique_ids_have_no_issue() {
        let occ = occurrences(&[("Q1", &[0]), ("Q2", &[1])]);
        assert!(duplicate_ids(&occ).is_none());
    }

    #[test]
    fn test_coverage_stats_from_items() {
        let items = vec![
            json!({"template_id": "mcq", "module_id": "m1", "atom_id": "a1"}),
            json!({"template_id": "mcq", "module_id": "m1", "atom_id": "a2"}),
            json!({"template_id": "fill_blank"}),
            json!(null),
        ];
        let stats = CoverageStats::from_items(&items);
        assert_eq!(stats.templates["mcq"], 2);
        assert_eq!(stats.templates["fill_blank"], 1);
        assert_eq!(stats.modules["m1"], 2);
        assert_eq!(stats.atoms.len(), 2);
    }

    #[test]
    fn test_coverage_gap_below_half_average() {
        let mut stats = CoverageStats::default();
        stats.atoms.insert("a1".into(), 10);
        stats.atoms.insert("a2".into(), 8);
        stats.atoms.insert("a3".into(), 2);

        let gaps = coverage_gaps(&stats, None);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].issue.code, IssueCode::CoverageGap);
        assert_eq!(gaps[0].issue.severity, crate::validation::Severity::Info);
        assert_eq!(gaps[0].details["atomId"], "a3");
        assert_eq!(gaps[0].details["count"], 2);
        assert_eq!(gaps[0].details["average"], 6.67);
    }

    #[test]
    fn test_even_coverage_has_no_gaps() {
        let mut stats = CoverageStats::default();
        stats.atoms.insert("a1".into(), 3);
        stats.atoms.insert("a2".into(), 3);
        assert!(coverage_gaps(&stats, None).is_empty());
        assert!(coverage_gaps(&CoverageStats::default(), None).is_empty());
    }

    #[test]
    fn test_index_adds_uncovered_atoms() {
        let index = CurriculumIndex::new()
            .with_atom("a1", "m1")
            .with_atom("a2", "m1")
            .with_atom("b1", "m2");
        let mut stats = CoverageStats::default();
        stats.modules.insert("m1".into(), 4);
        stats.atoms.insert("a1".into(), 4);

        let gaps = coverage_gaps(&stats, Some(&index));
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].details["atomId"], "a2");
        assert_eq!(gaps[0].details["count"], 0);
    }

    #[test]
    fn test_item_count_mismatch() {
        let manifest = Manifest {
            declared_item_count: Some(5),
            ..Manifest::default()
        };
        let issue = item_count_mismatch(Some(&manifest), 3).unwrap();
        assert_eq!(issue.issue.code, IssueCode::ItemCountMismatch);
        assert_eq!(issue.issue.expected.as_deref(), Some("5"));
        assert!(item_count_mismatch(Some(&manifest), 5).is_none());
        assert!(item_count_mismatch(None, 3).is_none());
        assert!(item_count_mismatch(Some(&Manifest::default()), 3).is_none());
    }
}
