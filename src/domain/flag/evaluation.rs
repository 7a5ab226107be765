//! Flag evaluation result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which step of the precedence chain produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    /// Master switch is off
    FlagDisabled,
    /// Environment override short-circuited to the default
    EnvironmentMatch,
    /// A targeting rule matched
    TargetingMatch,
    /// A segment matched
    SegmentMatch,
    /// User fell inside the rollout percentage
    PercentageRollout,
    /// Rollout configured, user fell outside it
    UserNotInRollout,
    /// Nothing matched; default served
    DefaultValue,
    /// Evaluation failed internally; default served
    Error,
}

/// Outcome of evaluating a flag for one context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The resolved value
    pub value: Value,
    /// Which step produced the value
    pub reason: EvaluationReason,
    /// ID of the matching rule, for `TargetingMatch` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
    /// When the evaluation ran
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Build a result with the given value and reason
    pub fn new(value: Value, reason: EvaluationReason) -> Self {
        Self {
            value,
            reason,
            matched_rule_id: None,
            evaluated_at: Utc::now(),
        }
    }

    /// Attach the ID of the rule that matched
    pub fn with_matched_rule(mut self, rule_id: Option<String>) -> Self {
        self.matched_rule_id = rule_id;
        self
    }
}
