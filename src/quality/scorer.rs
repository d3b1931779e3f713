//! Completeness scoring over an item's optional pedagogical enrichments.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::item::QuestionItem;
use crate::validation::{IssueCode, Tier, TierResult, ValidationIssue};

/// Default penalty for an item without misconceptions.
const DEFAULT_MISCONCEPTIONS_WEIGHT: f64 = 0.20;

/// Default penalty for an item without a worked solution.
const DEFAULT_WORKED_SOLUTION_WEIGHT: f64 = 0.10;

/// Default penalty for an item without a feedback map.
const DEFAULT_FEEDBACK_MAP_WEIGHT: f64 = 0.08;

/// Default penalty for an item without a transfer item.
const DEFAULT_TRANSFER_ITEM_WEIGHT: f64 = 0.15;

/// Default penalty for an item without telemetry tags.
const DEFAULT_TELEMETRY_TAGS_WEIGHT: f64 = 0.07;

/// Optional enrichments that raise an item's quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enrichment {
    Misconceptions,
    WorkedSolution,
    FeedbackMap,
    TransferItem,
    TelemetryTags,
}

impl Enrichment {
    pub const ALL: [Enrichment; 5] = [
        Enrichment::Misconceptions,
        Enrichment::WorkedSolution,
        Enrichment::FeedbackMap,
        Enrichment::TransferItem,
        Enrichment::TelemetryTags,
    ];

    /// Item field carrying this enrichment.
    pub fn field(&self) -> &'static str {
        match self {
            Enrichment::Misconceptions => "misconceptions",
            Enrichment::WorkedSolution => "worked_solution",
            Enrichment::FeedbackMap => "feedback_map",
            Enrichment::TransferItem => "transfer_item",
            Enrichment::TelemetryTags => "telemetry",
        }
    }

    /// Issue code recorded when the enrichment is missing.
    pub fn missing_code(&self) -> IssueCode {
        match self {
            Enrichment::Misconceptions => IssueCode::MissingMisconceptions,
            Enrichment::WorkedSolution => IssueCode::MissingWorkedSolution,
            Enrichment::FeedbackMap => IssueCode::MissingFeedbackMap,
            Enrichment::TransferItem => IssueCode::MissingTransferItem,
            Enrichment::TelemetryTags => IssueCode::MissingTelemetryTags,
        }
    }

    fn is_present(&self, item: &QuestionItem<'_>) -> bool {
        match self {
            Enrichment::TelemetryTags => item.has_telemetry_tags(),
            other => item.has_enrichment(other.field()),
        }
    }
}

impl fmt::Display for Enrichment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Enrichment::Misconceptions => "misconceptions",
            Enrichment::WorkedSolution => "worked solution",
            Enrichment::FeedbackMap => "feedback map",
            Enrichment::TransferItem => "transfer item",
            Enrichment::TelemetryTags => "telemetry tags",
        };
        f.write_str(name)
    }
}

/// Letter grade derived from a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub const ALL: [QualityGrade; 5] = [
        QualityGrade::A,
        QualityGrade::B,
        QualityGrade::C,
        QualityGrade::D,
        QualityGrade::F,
    ];

    /// Maps a score onto its band. Bounds are exclusive: 0.85 is a B.
    pub fn from_score(score: f64) -> Self {
        if score > 0.85 {
            QualityGrade::A
        } else if score > 0.70 {
            QualityGrade::B
        } else if score > 0.55 {
            QualityGrade::C
        } else if score > 0.40 {
            QualityGrade::D
        } else {
            QualityGrade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
            QualityGrade::F => "F",
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty subtracted for each missing enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub misconceptions: f64,
    pub worked_solution: f64,
    pub feedback_map: f64,
    pub transfer_item: f64,
    pub telemetry_tags: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            misconceptions: DEFAULT_MISCONCEPTIONS_WEIGHT,
            worked_solution: DEFAULT_WORKED_SOLUTION_WEIGHT,
            feedback_map: DEFAULT_FEEDBACK_MAP_WEIGHT,
            transfer_item: DEFAULT_TRANSFER_ITEM_WEIGHT,
            telemetry_tags: DEFAULT_TELEMETRY_TAGS_WEIGHT,
        }
    }
}

impl QualityWeights {
    pub fn weight(&self, enrichment: Enrichment) -> f64 {
        match enrichment {
            Enrichment::Misconceptions => self.misconceptions,
            Enrichment::WorkedSolution => self.worked_solution,
            Enrichment::FeedbackMap => self.feedback_map,
            Enrichment::TransferItem => self.transfer_item,
            Enrichment::TelemetryTags => self.telemetry_tags,
        }
    }
}

/// Result of scoring one item.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    /// Score in `[0, 1]`, rounded to four decimals.
    pub score: f64,
    pub grade: QualityGrade,
    /// Enrichments the item lacks, in scoring order.
    pub missing: Vec<Enrichment>,
}

impl QualityAssessment {
    /// Assessment given to items that cannot be scored at all.
    pub fn failing() -> Self {
        Self {
            score: 0.0,
            grade: QualityGrade::F,
            missing: Enrichment::ALL.to_vec(),
        }
    }

    /// Converts the assessment into the quality tier result.
    ///
    /// The tier only records INFO issues, so it is always valid.
    pub fn to_tier_result(&self) -> TierResult {
        let mut result = TierResult::valid(Tier::Quality);
        for enrichment in &self.missing {
            result.push(ValidationIssue::info(
                enrichment.missing_code(),
                enrichment.field(),
                format!("Item has no {}", enrichment),
            ));
        }
        result
    }
}

/// Pure scorer mapping enrichment completeness to a score and grade.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses custom penalties. Negative weights are treated as zero.
    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = QualityWeights {
            misconceptions: weights.misconceptions.max(0.0),
            worked_solution: weights.worked_solution.max(0.0),
            feedback_map: weights.feedback_map.max(0.0),
            transfer_item: weights.transfer_item.max(0.0),
            telemetry_tags: weights.telemetry_tags.max(0.0),
        };
        self
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// Scores a raw item. Values that are not objects score 0.0 (grade F).
    pub fn assess(&self, value: &Value) -> QualityAssessment {
        match QuestionItem::from_value(value) {
            Ok(item) => self.assess_item(&item),
            Err(_) => QualityAssessment::failing(),
        }
    }

    pub fn assess_item(&self, item: &QuestionItem<'_>) -> QualityAssessment {
        let missing: Vec<Enrichment> = Enrichment::ALL
            .into_iter()
            .filter(|e| !e.is_present(item))
            .collect();

        let penalty: f64 = missing.iter().map(|e| self.weights.weight(*e)).sum();
        let score = round4((1.0 - penalty).clamp(0.0, 1.0));

        QualityAssessment {
            score,
            grade: QualityGrade::from_score(score),
            missing,
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
