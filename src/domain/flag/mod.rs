//! Feature flag domain module
//!
//! Flags resolve arbitrary JSON values per user through a fixed precedence
//! chain. Evaluation never fails; misconfiguration degrades to the flag's
//! default value with an `Error` reason.

mod entity;
mod evaluation;
mod evaluator;

// Re-export all public types
pub use entity::{FeatureFlag, FlagRule, FlagSegment, UserSegment, flag_rule};
pub use evaluation::{EvaluationReason, EvaluationResult};
pub use evaluator::evaluate_flag;
