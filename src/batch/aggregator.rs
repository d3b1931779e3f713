//! Running aggregates over completed item results.
//!
//! A single aggregator task owns the [`SummaryAccumulator`] and drains the
//! result channel, so the counters are never shared between workers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::quality::QualityGrade;
use crate::validation::ItemResult;

/// Template bucket for items that declare no template.
pub const UNKNOWN_TEMPLATE_BUCKET: &str = "unknown";

/// Progress notification sent after each completed item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Percentage in `[0, 100]`, rounded to two decimals.
    pub percent_complete: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent_complete = if total == 0 {
            100.0
        } else {
            ((completed as f64 / total as f64) * 10_000.0).round() / 100.0
        };
        Self {
            completed,
            total,
            percent_complete,
        }
    }
}

/// Batch-level counts and distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub valid_items: usize,
    pub invalid_items: usize,
    /// Items carrying at least one WARNING, valid or not.
    pub with_warnings: usize,
    /// Item count per quality grade; every grade is listed.
    pub quality_grade_distribution: BTreeMap<String, usize>,
    pub template_distribution: BTreeMap<String, usize>,
    /// Occurrences of each CRITICAL issue code across items.
    pub error_code_frequency: BTreeMap<String, usize>,
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self {
            valid_items: 0,
            invalid_items: 0,
            with_warnings: 0,
            quality_grade_distribution: QualityGrade::ALL
                .iter()
                .map(|g| (g.as_str().to_string(), 0))
                .collect(),
            template_distribution: BTreeMap::new(),
            error_code_frequency: BTreeMap::new(),
        }
    }
}

/// Accumulates results in completion order.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    summary: BatchSummary,
    completed: usize,
    id_occurrences: BTreeMap<String, Vec<usize>>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one result, produced for the item at `index`, into the aggregates.
    pub fn record(&mut self, index: usize, result: &ItemResult) {
        let summary = &mut self.summary;
        if result.is_valid {
            summary.valid_items += 1;
        } else {
            summary.invalid_items += 1;
        }
        if result.has_warnings() {
            summary.with_warnings += 1;
        }

        *summary
            .quality_grade_distribution
            .entry(result.quality_grade.as_str().to_string())
            .or_default() += 1;

        let template = result
            .template_id
            .as_deref()
            .unwrap_or(UNKNOWN_TEMPLATE_BUCKET);
        *summary
            .template_distribution
            .entry(template.to_string())
            .or_default() += 1;

        for issue in &result.errors {
            *summary
                .error_code_frequency
                .entry(issue.code.as_str().to_string())
                .or_default() += 1;
        }

        self.id_occurrences
            .entry(result.item_id.clone())
            .or_default()
            .push(index);
        self.completed += 1;
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    /// Consumes the accumulator, returning the summary and the input indices
    /// seen for each item id (sorted ascending).
    pub fn finish(self) -> (BatchSummary, BTreeMap<String, Vec<usize>>) {
        let mut occurrences = self.id_occurrences;
        for indices in occurrences.values_mut() {
            indices.sort_unstable();
        }
        (self.summary, occurrences)
    }
}
