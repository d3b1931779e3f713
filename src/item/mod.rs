//! Question items and their interaction templates.
//!
//! - [`TemplateId`]: the closed set of interaction templates and their families
//! - [`QuestionItem`]: read-only view over a raw JSON item
//! - [`TemplatePayload`]: the template-specific payload decoded into concrete types

mod payload;
mod question;
mod template;

pub use payload::{
    AcceptedAnswers, ChoiceAnswer, ChoiceConfig, ChoiceOption, ChoiceSpec, EquationAnswer,
    EquationConfig, EquationSpec, FillBlankAnswer, FillBlankConfig, FillBlankSpec, ItemKey,
    MappingEntry, MappingSpec, NumericAnswer, NumericConfig, NumericSpec, SequenceAnswer,
    SequenceConfig, SequenceSpec, SequenceStep, TemplatePayload,
};
pub use question::{is_present, json_type_name, QuestionItem};
pub use template::{TemplateFamily, TemplateId};
