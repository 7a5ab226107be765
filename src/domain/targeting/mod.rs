//! Targeting rule model and evaluation
//!
//! Rules gate experiment eligibility and drive flag targeting. Evaluation is
//! fail-closed: any condition that cannot be decided (missing attribute,
//! non-numeric operand, invalid regex) is a non-match, never an error.

mod evaluator;
mod rule;

pub use evaluator::{MatchResult, evaluate_rules};
pub use rule::{RuleOperator, TargetingRule};

pub(crate) use evaluator::rule_matches;
