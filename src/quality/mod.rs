//! Quality scoring for question items.
//!
//! Scoring is a separate axis from structural validity: a valid item can
//! still be poorly enriched, and the score never changes an item's verdict.

mod scorer;

pub use scorer::{Enrichment, QualityAssessment, QualityGrade, QualityScorer, QualityWeights};
