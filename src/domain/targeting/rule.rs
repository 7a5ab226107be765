//! Targeting rule types

use serde::{Deserialize, Serialize};

use crate::domain::context::AttributeValue;

/// Comparison operator for a targeting rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
    Regex,
    Exists,
    NotExists,
}

impl RuleOperator {
    /// Check whether the operator reads the attribute's value
    ///
    /// EXISTS/NOT_EXISTS only look at key presence.
    pub fn reads_value(&self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }
}

/// A single attribute/operator/value condition with a priority
///
/// Higher priority evaluates first; ties keep definition order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetingRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub attribute: String,
    pub operator: RuleOperator,
    pub value: AttributeValue,
    pub priority: i32,
}

impl TargetingRule {
    /// Create a rule with priority 0
    pub fn new(
        attribute: impl Into<String>,
        operator: RuleOperator,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            id: None,
            attribute: attribute.into(),
            operator,
            value: value.into(),
            priority: 0,
        }
    }

    /// Create an EXISTS rule (the value is ignored by evaluation)
    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::new(attribute, RuleOperator::Exists, true)
    }

    /// Create a NOT_EXISTS rule (the value is ignored by evaluation)
    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::new(attribute, RuleOperator::NotExists, true)
    }

    /// Set the rule ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
