//! Feature flag configuration entities

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::context::{AttributeValue, EvaluationContext};
use crate::domain::targeting::{RuleOperator, TargetingRule, rule_matches};

// ============================================================================
// FeatureFlag
// ============================================================================

/// A feature flag definition
///
/// A flag resolves to an arbitrary JSON value per user. Resolution walks a
/// fixed precedence chain: kill switch, environment override, targeting
/// rules, segments, percentage rollout, default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Unique flag key, also used as the bucketing subject for rollouts
    key: String,
    /// Master switch; when false the flag always resolves to its default
    enabled: bool,
    /// Value returned when nothing else matches
    default_value: Value,
    /// Percentage of users receiving the rollout value, in [0, 100]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percentage_enabled: Option<f64>,
    /// Value served to users inside the rollout percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rollout_value: Option<Value>,
    /// Per-environment overrides; `false` short-circuits to the default
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    environments: HashMap<String, bool>,
    /// Targeting rules, evaluated in priority order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rules: Vec<FlagRule>,
    /// Segment overrides, evaluated in definition order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    segments: Vec<FlagSegment>,
}

impl FeatureFlag {
    /// Create a new flag with the given key and default value
    pub fn new(key: impl Into<String>, default_value: Value) -> Self {
        Self {
            key: key.into(),
            enabled: true,
            default_value,
            percentage_enabled: None,
            rollout_value: None,
            environments: HashMap::new(),
            rules: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// Set the master switch
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the rollout percentage
    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage_enabled = Some(percentage);
        self
    }

    /// Set the value served inside the rollout percentage
    pub fn with_rollout_value(mut self, value: Value) -> Self {
        self.rollout_value = Some(value);
        self
    }

    /// Set an environment override
    pub fn with_environment(mut self, environment: impl Into<String>, enabled: bool) -> Self {
        self.environments.insert(environment.into(), enabled);
        self
    }

    /// Add a targeting rule
    pub fn with_rule(mut self, rule: FlagRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a segment override
    pub fn with_segment(mut self, segment: FlagSegment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Get the flag key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check whether the master switch is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the default value
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Get the rollout percentage, if configured
    pub fn percentage_enabled(&self) -> Option<f64> {
        self.percentage_enabled
    }

    /// Get the rollout value, if configured
    pub fn rollout_value(&self) -> Option<&Value> {
        self.rollout_value.as_ref()
    }

    /// Get the override for an environment, if one is configured
    pub fn environment(&self, environment: &str) -> Option<bool> {
        self.environments.get(environment).copied()
    }

    /// Get the targeting rules
    pub fn rules(&self) -> &[FlagRule] {
        &self.rules
    }

    /// Get the segment overrides
    pub fn segments(&self) -> &[FlagSegment] {
        &self.segments
    }
}

// ============================================================================
// FlagRule
// ============================================================================

/// A targeting rule attached to a flag, carrying the value it returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRule {
    #[serde(flatten)]
    rule: TargetingRule,
    /// Disabled rules are skipped without affecting precedence
    #[serde(default = "default_true")]
    enabled: bool,
    /// Value returned when this rule matches
    return_value: Value,
}

fn default_true() -> bool {
    true
}

impl FlagRule {
    /// Create a new flag rule
    pub fn new(rule: TargetingRule, return_value: Value) -> Self {
        Self {
            rule,
            enabled: true,
            return_value,
        }
    }

    /// Set whether the rule participates in evaluation
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Get the underlying targeting rule
    pub fn rule(&self) -> &TargetingRule {
        &self.rule
    }

    /// Check whether the rule participates in evaluation
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the value returned on match
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }
}

// ============================================================================
// Segments
// ============================================================================

/// A reusable set of targeting rules identifying a user population
///
/// A user is in the segment when any of its rules matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSegment {
    key: String,
    rules: Vec<TargetingRule>,
}

impl UserSegment {
    /// Create a new segment
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rules: Vec::new(),
        }
    }

    /// Add a membership rule
    pub fn with_rule(mut self, rule: TargetingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Get the segment key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the membership rules
    pub fn rules(&self) -> &[TargetingRule] {
        &self.rules
    }

    /// Check whether the context's user belongs to this segment
    pub fn contains(&self, ctx: &EvaluationContext) -> bool {
        self.rules
            .iter()
            .any(|rule| rule_matches(&rule.attribute, rule.operator, &rule.value, ctx))
    }
}

/// A segment override on a flag: a resolved segment plus the value it returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSegment {
    segment: UserSegment,
    return_value: Value,
}

impl FlagSegment {
    /// Create a new segment override
    pub fn new(segment: UserSegment, return_value: Value) -> Self {
        Self {
            segment,
            return_value,
        }
    }

    /// Get the resolved segment
    pub fn segment(&self) -> &UserSegment {
        &self.segment
    }

    /// Get the value returned when the user is in the segment
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }
}

/// Convenience constructor for a rule used inside a flag
pub fn flag_rule(
    attribute: impl Into<String>,
    operator: RuleOperator,
    value: impl Into<AttributeValue>,
    return_value: Value,
) -> FlagRule {
    FlagRule::new(TargetingRule::new(attribute, operator, value), return_value)
}
