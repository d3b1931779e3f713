//! Template-specific payload shapes.
//!
//! Items arrive with a loosely typed `template_payload` (or `interaction.config`)
//! and `answer_key`. [`TemplatePayload::parse`] decodes both into the concrete
//! types of the declared template, so rules never guess at shapes at runtime.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::question::json_type_name;
use super::template::TemplateId;
use crate::error::PayloadError;

/// An identifier written either as a string or as a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(pub String);

impl ItemKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ItemKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(ItemKey(s)),
            Value::Number(n) => Ok(ItemKey(n.to_string())),
            other => Err(D::Error::custom(format!(
                "expected a string or number identifier, found {}",
                json_type_name(&other)
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Choice family
// ---------------------------------------------------------------------------

/// One selectable option: a bare string, a bare number, or `{id, text}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChoiceOption {
    Text(String),
    Number(serde_json::Number),
    Detailed {
        #[serde(default)]
        id: Option<ItemKey>,
        #[serde(default, alias = "label")]
        text: String,
    },
}

impl ChoiceOption {
    pub fn id(&self) -> Option<&str> {
        match self {
            ChoiceOption::Detailed { id: Some(id), .. } => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        match self {
            ChoiceOption::Text(text) | ChoiceOption::Detailed { text, .. } => {
                Cow::Borrowed(text.as_str())
            }
            ChoiceOption::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceConfig {
    #[serde(default, alias = "choices")]
    pub options: Vec<ChoiceOption>,
    /// Second-tier reasons, used by `two_tier` only.
    #[serde(default)]
    pub reasons: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceAnswer {
    #[serde(default, alias = "correct_option_index")]
    pub correct_index: Option<usize>,
    #[serde(default)]
    pub correct_option_id: Option<ItemKey>,
    #[serde(default)]
    pub correct_indices: Vec<usize>,
    #[serde(default)]
    pub correct_reason_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ChoiceSpec {
    pub config: ChoiceConfig,
    pub answer: ChoiceAnswer,
}

// ---------------------------------------------------------------------------
// Numeric family
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumericConfig {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumericAnswer {
    #[serde(default, alias = "correct_value")]
    pub value: Option<f64>,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NumericSpec {
    pub config: NumericConfig,
    pub answer: NumericAnswer,
}

// ---------------------------------------------------------------------------
// Sequence family
// ---------------------------------------------------------------------------

/// One step or operation: a bare string or `{id, text}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SequenceStep {
    Text(String),
    Detailed {
        #[serde(default)]
        id: Option<ItemKey>,
        #[serde(default, alias = "description", alias = "operation")]
        text: String,
    },
}

impl SequenceStep {
    pub fn id(&self) -> Option<&str> {
        match self {
            SequenceStep::Detailed { id: Some(id), .. } => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SequenceStep::Text(text) | SequenceStep::Detailed { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SequenceConfig {
    #[serde(default)]
    pub steps: Vec<SequenceStep>,
    /// Operation list of `balance_ops`; replaces `steps` when both are given.
    #[serde(default)]
    pub operations: Option<Vec<SequenceStep>>,
    /// Starting equation, used by `balance_ops`.
    #[serde(default)]
    pub equation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SequenceAnswer {
    #[serde(default)]
    pub correct_order: Option<Vec<ItemKey>>,
    #[serde(default)]
    pub final_answer: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub solution: Option<Value>,
    #[serde(default)]
    pub error_step_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SequenceSpec {
    pub config: SequenceConfig,
    pub answer: SequenceAnswer,
}

// ---------------------------------------------------------------------------
// Mapping family
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MappingEntry {
    pub id: ItemKey,
    #[serde(default, alias = "label")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClassificationConfig {
    #[serde(default)]
    items: Vec<MappingEntry>,
    #[serde(default, alias = "categories")]
    bins: Vec<MappingEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClassificationAnswer {
    #[serde(default, alias = "correct_mapping")]
    mapping: BTreeMap<String, ItemKey>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MatchingConfig {
    #[serde(default)]
    left: Vec<MappingEntry>,
    #[serde(default)]
    right: Vec<MappingEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MatchingAnswer {
    #[serde(default, alias = "correct_pairs")]
    pairs: BTreeMap<String, ItemKey>,
}

/// Normalised shape shared by classification and matching: every source id
/// maps onto one target id.
#[derive(Debug, Clone)]
pub struct MappingSpec {
    pub sources: Vec<MappingEntry>,
    pub targets: Vec<MappingEntry>,
    pub mapping: BTreeMap<String, ItemKey>,
}

// ---------------------------------------------------------------------------
// Equation and free-text families
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquationConfig {
    #[serde(default)]
    pub reactants: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquationAnswer {
    #[serde(default)]
    pub coefficients: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct EquationSpec {
    pub config: EquationConfig,
    pub answer: EquationAnswer,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FillBlankConfig {
    #[serde(default, alias = "template")]
    pub text: String,
}

/// Accepted answers for one blank.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AcceptedAnswers {
    One(String),
    Many(Vec<String>),
}

impl AcceptedAnswers {
    /// Non-empty accepted answers, trimmed.
    pub fn answers(&self) -> Vec<&str> {
        let all: Vec<&str> = match self {
            AcceptedAnswers::One(answer) => vec![answer.as_str()],
            AcceptedAnswers::Many(answers) => answers.iter().map(String::as_str).collect(),
        };
        all.into_iter()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FillBlankAnswer {
    #[serde(default)]
    pub blanks: Vec<AcceptedAnswers>,
}

#[derive(Debug, Clone)]
pub struct FillBlankSpec {
    pub config: FillBlankConfig,
    pub answer: FillBlankAnswer,
}

// ---------------------------------------------------------------------------
// The sum type
// ---------------------------------------------------------------------------

/// Decoded payload of an item, one variant per template.
#[derive(Debug, Clone)]
pub enum TemplatePayload {
    Mcq(ChoiceSpec),
    TwoTier(ChoiceSpec),
    MultiSelect(ChoiceSpec),
    NumericInput(NumericSpec),
    NumberLine(NumericSpec),
    StepOrder(SequenceSpec),
    WorkedExample(SequenceSpec),
    BalanceOps(SequenceSpec),
    MultiStepWord(SequenceSpec),
    ErrorAnalysis(SequenceSpec),
    Classification(MappingSpec),
    Matching(MappingSpec),
    EquationBalance(EquationSpec),
    FillBlank(FillBlankSpec),
}

impl TemplatePayload {
    /// Decodes `config` and `answer` into the payload of `template`.
    ///
    /// A missing (or null) config or answer decodes as an empty object, so
    /// absent fields surface later as rule violations rather than decode
    /// errors.
    pub fn parse(
        template: TemplateId,
        config: Option<&Value>,
        answer: Option<&Value>,
    ) -> Result<Self, PayloadError> {
        let payload = match template {
            TemplateId::Mcq => TemplatePayload::Mcq(choice(config, answer)?),
            TemplateId::TwoTier => TemplatePayload::TwoTier(choice(config, answer)?),
            TemplateId::MultiSelect => TemplatePayload::MultiSelect(choice(config, answer)?),
            TemplateId::NumericInput => TemplatePayload::NumericInput(numeric(config, answer)?),
            TemplateId::NumberLine => TemplatePayload::NumberLine(numeric(config, answer)?),
            TemplateId::StepOrder => TemplatePayload::StepOrder(sequence(config, answer)?),
            TemplateId::WorkedExample => {
                TemplatePayload::WorkedExample(sequence(config, answer)?)
            }
            TemplateId::BalanceOps => TemplatePayload::BalanceOps(balance_ops(config, answer)?),
            TemplateId::MultiStepWord => {
                TemplatePayload::MultiStepWord(sequence(config, answer)?)
            }
            TemplateId::ErrorAnalysis => {
                TemplatePayload::ErrorAnalysis(sequence(config, answer)?)
            }
            TemplateId::Classification => {
                let cfg: ClassificationConfig = decode(config, "template_payload")?;
                let ans: ClassificationAnswer = decode(answer, "answer_key")?;
                TemplatePayload::Classification(MappingSpec {
                    sources: cfg.items,
                    targets: cfg.bins,
                    mapping: ans.mapping,
                })
            }
            TemplateId::Matching => {
                let cfg: MatchingConfig = decode(config, "template_payload")?;
                let ans: MatchingAnswer = decode(answer, "answer_key")?;
                TemplatePayload::Matching(MappingSpec {
                    sources: cfg.left,
                    targets: cfg.right,
                    mapping: ans.pairs,
                })
            }
            TemplateId::EquationBalance => TemplatePayload::EquationBalance(EquationSpec {
                config: decode(config, "template_payload")?,
                answer: decode(answer, "answer_key")?,
            }),
            TemplateId::FillBlank => TemplatePayload::FillBlank(FillBlankSpec {
                config: decode(config, "template_payload")?,
                answer: decode(answer, "answer_key")?,
            }),
        };
        Ok(payload)
    }

    /// Returns the template this payload belongs to.
    pub fn template_id(&self) -> TemplateId {
        match self {
            TemplatePayload::Mcq(_) => TemplateId::Mcq,
            TemplatePayload::TwoTier(_) => TemplateId::TwoTier,
            TemplatePayload::MultiSelect(_) => TemplateId::MultiSelect,
            TemplatePayload::NumericInput(_) => TemplateId::NumericInput,
            TemplatePayload::NumberLine(_) => TemplateId::NumberLine,
            TemplatePayload::StepOrder(_) => TemplateId::StepOrder,
            TemplatePayload::WorkedExample(_) => TemplateId::WorkedExample,
            TemplatePayload::BalanceOps(_) => TemplateId::BalanceOps,
            TemplatePayload::MultiStepWord(_) => TemplateId::MultiStepWord,
            TemplatePayload::ErrorAnalysis(_) => TemplateId::ErrorAnalysis,
            TemplatePayload::Classification(_) => TemplateId::Classification,
            TemplatePayload::Matching(_) => TemplateId::Matching,
            TemplatePayload::EquationBalance(_) => TemplateId::EquationBalance,
            TemplatePayload::FillBlank(_) => TemplateId::FillBlank,
        }
    }
}

fn choice(config: Option<&Value>, answer: Option<&Value>) -> Result<ChoiceSpec, PayloadError> {
    Ok(ChoiceSpec {
        config: decode(config, "template_payload")?,
        answer: decode(answer, "answer_key")?,
    })
}

fn numeric(config: Option<&Value>, answer: Option<&Value>) -> Result<NumericSpec, PayloadError> {
    Ok(NumericSpec {
        config: decode(config, "template_payload")?,
        answer: decode(answer, "answer_key")?,
    })
}

fn sequence(
    config: Option<&Value>,
    answer: Option<&Value>,
) -> Result<SequenceSpec, PayloadError> {
    Ok(SequenceSpec {
        config: decode(config, "template_payload")?,
        answer: decode(answer, "answer_key")?,
    })
}

fn balance_ops(
    config: Option<&Value>,
    answer: Option<&Value>,
) -> Result<SequenceSpec, PayloadError> {
    let mut spec = sequence(config, answer)?;
    if let Some(operations) = spec.config.operations.take() {
        spec.config.steps = operations;
    }
    Ok(spec)
}

fn decode<T: DeserializeOwned>(
    value: Option<&Value>,
    field: &'static str,
) -> Result<T, PayloadError> {
    let result = match value {
        None | Some(Value::Null) => T::deserialize(&Value::Object(Map::new())),
        Some(value) => T::deserialize(value),
    };
    result.map_err(|source| PayloadError { field, source })
}
