//! The batch report and its CSV projection.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::aggregator::BatchSummary;
use super::analysis::CoverageStats;
use super::input::Manifest;
use crate::error::ReportError;
use crate::validation::{IssueCode, ItemResult, Severity, ValidationIssue};

/// Header row of the CSV projection.
pub const CSV_HEADER: [&str; 7] = [
    "itemId",
    "templateId",
    "status",
    "qualityGrade",
    "errorCount",
    "warningCount",
    "primaryErrorCode",
];

/// An issue about the batch as a whole, with structured details flattened
/// next to the issue fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalIssue {
    #[serde(flatten)]
    pub issue: ValidationIssue,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl GlobalIssue {
    pub fn new(issue: ValidationIssue) -> Self {
        Self {
            issue,
            details: Map::new(),
        }
    }

    /// Attaches a detail field.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// Wall-clock timing of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_time_ms: u64,
    pub average_time_per_item_ms: f64,
}

impl PerformanceMetrics {
    pub fn new(total_time_ms: u64, items: usize) -> Self {
        let average_time_per_item_ms = if items == 0 {
            0.0
        } else {
            ((total_time_ms as f64 / items as f64) * 100.0).round() / 100.0
        };
        Self {
            total_time_ms,
            average_time_per_item_ms,
        }
    }
}

/// Outcome of certifying one submission.
///
/// `item_results[i]` always belongs to the i-th submitted item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_items: usize,
    pub summary: BatchSummary,
    pub item_results: Vec<ItemResult>,
    pub global_issues: Vec<GlobalIssue>,
    pub coverage: CoverageStats,
    pub performance_metrics: PerformanceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
}

impl BatchReport {
    /// A report without items, carrying only global issues.
    pub fn empty(session_id: impl Into<String>, global_issues: Vec<GlobalIssue>) -> Self {
        Self {
            session_id: session_id.into(),
            generated_at: Utc::now(),
            total_items: 0,
            summary: BatchSummary::default(),
            item_results: Vec::new(),
            global_issues,
            coverage: CoverageStats::default(),
            performance_metrics: PerformanceMetrics::default(),
            manifest: None,
        }
    }

    /// Whether a global issue carries `code`.
    pub fn has_global_issue(&self, code: IssueCode) -> bool {
        self.global_issues.iter().any(|g| g.issue.code == code)
    }

    /// Whether any item is invalid or any global issue is CRITICAL.
    pub fn has_blocking_issues(&self) -> bool {
        self.summary.invalid_items > 0
            || self
                .global_issues
                .iter()
                .any(|g| g.issue.severity == Severity::Critical)
    }

    /// Renders one row per item, in input order, with RFC 4180 quoting.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));
        for result in &self.item_results {
            push_row(
                &mut out,
                [
                    result.item_id.clone(),
                    result.template_id.clone().unwrap_or_default(),
                    csv_status(result).to_string(),
                    result.quality_grade.to_string(),
                    result.errors.len().to_string(),
                    result.warnings.len().to_string(),
                    result
                        .primary_error_code()
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                ],
            );
        }
        out
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the JSON report to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the CSV projection to `path`.
    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        fs::write(path, self.to_csv()).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `FAIL` for invalid items, `WARN` for valid items with warnings, else `PASS`.
pub fn csv_status(result: &ItemResult) -> &'static str {
    if !result.is_valid {
        "FAIL"
    } else if result.has_warnings() {
        "WARN"
    } else {
        "PASS"
    }
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| escape_csv(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ItemPipeline, ItemValidator};
    use serde_json::json;

    fn report_with(items: &[Value]) -> BatchReport {
        let pipeline = ItemPipeline::new(None);
        let mut report = BatchReport::empty("s-1", Vec::new());
        report.item_results = items
            .iter()
            .map(|i| pipeline.validate(i).unwrap())
            .collect();
        report.total_items = items.len();
        report
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_rows_and_status() {
        let report = report_with(&[
            json!({"item_id": "pass-1", "template_id": "numeric_input", "prompt": "1+1", "answer_key": {"value": 2, "tolerance": 0}}),
            json!({"item_id": "warn-1", "template_id": "numeric_input", "prompt": "1+1", "answer_key": {"value": 2}}),
            json!({"item_id": "fail-1", "template_id": "mcq", "prompt": "?"}),
        ]);
        let csv = report.to_csv();
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(
            lines[0],
            "itemId,templateId,status,qualityGrade,errorCount,warningCount,primaryErrorCode"
        );
        assert_eq!(lines[1], "pass-1,numeric_input,PASS,F,0,0,");
        assert_eq!(lines[2], "warn-1,numeric_input,WARN,F,0,1,");
        assert!(lines[3].starts_with("fail-1,mcq,FAIL,F,"));
        assert!(lines[3].ends_with(",MISSING_REQUIRED_FIELD"));
        assert_eq!(lines[4], "");
    }

    #[test]
    fn test_report_json_shape() {
        let duplicate = GlobalIssue::new(ValidationIssue::critical(
            IssueCode::DuplicateItemIds,
            "item_id",
            "dup",
        ))
        .with_detail("duplicateIds", json!([{"itemId": "Q1", "count": 2}]));
        let report = BatchReport::empty("s-1", vec![duplicate]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["totalItems"], 0);
        assert_eq!(json["summary"]["validItems"], 0);
        assert_eq!(json["globalIssues"][0]["code"], "DUPLICATE_ITEM_IDS");
        assert_eq!(json["globalIssues"][0]["severity"], "CRITICAL");
        assert_eq!(json["globalIssues"][0]["duplicateIds"][0]["itemId"], "Q1");
        assert!(json["performanceMetrics"]["totalTimeMs"].is_u64());
        assert!(json.get("manifest").is_none());
        assert!(report.has_blocking_issues());
        assert!(report.has_global_issue(IssueCode::DuplicateItemIds));
    }

    #[test]
    fn test_performance_average() {
        let metrics = PerformanceMetrics::new(1000, 3);
        assert_eq!(metrics.average_time_per_item_ms, 333.33);
        assert_eq!(PerformanceMetrics::new(5, 0).average_time_per_item_ms, 0.0);
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_with(&[json!({"item_id": "q1"})]);

        let json_path = dir.path().join("report.json");
        let csv_path = dir.path().join("report.csv");
        report.write_json(&json_path).unwrap();
        report.write_csv(&csv_path).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(written["itemResults"][0]["itemId"], "q1");
        assert!(fs::read_to_string(&csv_path).unwrap().contains("q1,,FAIL"));

        let missing_dir = dir.path().join("nope").join("report.json");
        assert!(matches!(
            report.write_json(&missing_dir),
            Err(ReportError::Write { .. })
        ));
    }
}
