//! The closed set of interaction templates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// An interaction template a question item can declare.
///
/// Every rule set in the template validator is keyed by this enum, so adding a
/// template is a compile-checked change: each `match` over `TemplateId` must
/// be extended before the crate builds again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    Mcq,
    TwoTier,
    MultiSelect,
    NumericInput,
    NumberLine,
    StepOrder,
    WorkedExample,
    BalanceOps,
    MultiStepWord,
    ErrorAnalysis,
    Classification,
    Matching,
    EquationBalance,
    FillBlank,
}

/// Template families sharing one structural rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFamily {
    /// Pick one or more options from a list.
    Choice,
    /// Enter a number.
    Numeric,
    /// Work through or order a list of steps.
    Sequence,
    /// Map items onto bins or pair two lists.
    Mapping,
    /// Balance a chemical equation with coefficients.
    Equation,
    /// Type short answers into blanks.
    FreeText,
}

impl TemplateId {
    /// Every known template, in catalogue order.
    pub const ALL: [TemplateId; 14] = [
        TemplateId::Mcq,
        TemplateId::TwoTier,
        TemplateId::MultiSelect,
        TemplateId::NumericInput,
        TemplateId::NumberLine,
        TemplateId::StepOrder,
        TemplateId::WorkedExample,
        TemplateId::BalanceOps,
        TemplateId::MultiStepWord,
        TemplateId::ErrorAnalysis,
        TemplateId::Classification,
        TemplateId::Matching,
        TemplateId::EquationBalance,
        TemplateId::FillBlank,
    ];

    /// Returns the wire identifier of the template.
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateId::Mcq => "mcq",
            TemplateId::TwoTier => "two_tier",
            TemplateId::MultiSelect => "multi_select",
            TemplateId::NumericInput => "numeric_input",
            TemplateId::NumberLine => "number_line",
            TemplateId::StepOrder => "step_order",
            TemplateId::WorkedExample => "worked_example",
            TemplateId::BalanceOps => "balance_ops",
            TemplateId::MultiStepWord => "multi_step_word",
            TemplateId::ErrorAnalysis => "error_analysis",
            TemplateId::Classification => "classification",
            TemplateId::Matching => "matching",
            TemplateId::EquationBalance => "equation_balance",
            TemplateId::FillBlank => "fill_blank",
        }
    }

    /// Returns the family whose rules apply to this template.
    pub fn family(self) -> TemplateFamily {
        match self {
            TemplateId::Mcq | TemplateId::TwoTier | TemplateId::MultiSelect => {
                TemplateFamily::Choice
            }
            TemplateId::NumericInput | TemplateId::NumberLine => TemplateFamily::Numeric,
            TemplateId::StepOrder
            | TemplateId::WorkedExample
            | TemplateId::BalanceOps
            | TemplateId::MultiStepWord
            | TemplateId::ErrorAnalysis => TemplateFamily::Sequence,
            TemplateId::Classification | TemplateId::Matching => TemplateFamily::Mapping,
            TemplateId::EquationBalance => TemplateFamily::Equation,
            TemplateId::FillBlank => TemplateFamily::FreeText,
        }
    }

    /// Whether the template can be validated without any payload at all.
    pub fn payload_optional(self) -> bool {
        matches!(self, TemplateId::NumericInput)
    }

    /// Parses a template identifier.
    ///
    /// Matching ignores case and surrounding whitespace, and accepts hyphens
    /// in place of underscores plus a few legacy aliases.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace('-', "_");
        let id = match normalized.as_str() {
            "mcq" | "multiple_choice" => TemplateId::Mcq,
            "two_tier" | "two_tier_mcq" => TemplateId::TwoTier,
            "multi_select" => TemplateId::MultiSelect,
            "numeric_input" | "numeric" => TemplateId::NumericInput,
            "number_line" => TemplateId::NumberLine,
            "step_order" => TemplateId::StepOrder,
            "worked_example" => TemplateId::WorkedExample,
            "balance_ops" => TemplateId::BalanceOps,
            "multi_step_word" => TemplateId::MultiStepWord,
            "error_analysis" => TemplateId::ErrorAnalysis,
            "classification" => TemplateId::Classification,
            "matching" => TemplateId::Matching,
            "equation_balance" => TemplateId::EquationBalance,
            "fill_blank" => TemplateId::FillBlank,
            _ => return None,
        };
        Some(id)
    }

    /// Comma-separated list of every known identifier, for error messages.
    pub fn known_ids() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ItemError::UnknownTemplate(s.to_string()))
    }
}

impl TemplateFamily {
    /// Returns the family name.
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateFamily::Choice => "choice",
            TemplateFamily::Numeric => "numeric",
            TemplateFamily::Sequence => "sequence",
            TemplateFamily::Mapping => "mapping",
            TemplateFamily::Equation => "equation",
            TemplateFamily::FreeText => "free_text",
        }
    }
}

impl fmt::Display for TemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_round_trip_through_parse() {
        for template in TemplateId::ALL {
            assert_eq!(TemplateId::parse(template.as_str()), Some(template));
        }
    }

    #[test]
    fn test_parse_is_lenient_about_formatting() {
        assert_eq!(TemplateId::parse("  MCQ "), Some(TemplateId::Mcq));
        assert_eq!(TemplateId::parse("two-tier"), Some(TemplateId::TwoTier));
        assert_eq!(
            TemplateId::parse("multiple_choice"),
            Some(TemplateId::Mcq)
        );
        assert_eq!(TemplateId::parse("drag_and_drop"), None);
        assert_eq!(TemplateId::parse(""), None);
    }

    #[test]
    fn test_from_str_reports_unknown_template() {
        let err = "hotspot".parse::<TemplateId>().unwrap_err();
        assert!(matches!(err, ItemError::UnknownTemplate(ref id) if id == "hotspot"));
    }

    #[test]
    fn test_families() {
        assert_eq!(TemplateId::TwoTier.family(), TemplateFamily::Choice);
        assert_eq!(TemplateId::NumberLine.family(), TemplateFamily::Numeric);
        assert_eq!(TemplateId::BalanceOps.family(), TemplateFamily::Sequence);
        assert_eq!(TemplateId::Matching.family(), TemplateFamily::Mapping);
        assert_eq!(
            TemplateId::EquationBalance.family(),
            TemplateFamily::Equation
        );
        assert_eq!(TemplateId::FillBlank.family(), TemplateFamily::FreeText);
    }

    #[test]
    fn test_serde_uses_wire_ids() {
        let json = serde_json::to_string(&TemplateId::MultiStepWord).unwrap();
        assert_eq!(json, "\"multi_step_word\"");
        let parsed: TemplateId = serde_json::from_str("\"equation_balance\"").unwrap();
        assert_eq!(parsed, TemplateId::EquationBalance);
    }

    #[test]
    fn test_known_ids_lists_all() {
        let ids = TemplateId::known_ids();
        assert_eq!(ids.split(", ").count(), 14);
        assert!(ids.contains("fill_blank"));
    }
}
