//! Rule evaluation
//!
//! Rules are evaluated in priority order (highest first, ties by definition
//! order through a stable sort — this is the documented tie-break policy) and
//! the first matching rule wins. A rule that cannot be decided does not
//! match; no evaluation path returns an error.

use std::cmp::{Ordering, Reverse};

use regex::Regex;
use tracing::debug;

use crate::domain::context::{AttributeValue, EvaluationContext};
use crate::domain::targeting::rule::{RuleOperator, TargetingRule};

/// Outcome of evaluating an ordered rule set against a context
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    /// Whether any rule matched
    pub matched: bool,
    /// The first matching rule, in priority order
    pub rule: Option<&'a TargetingRule>,
}

impl<'a> MatchResult<'a> {
    fn matched(rule: &'a TargetingRule) -> Self {
        Self {
            matched: true,
            rule: Some(rule),
        }
    }

    fn no_match() -> Self {
        Self {
            matched: false,
            rule: None,
        }
    }

    /// ID of the matched rule, if it has one
    pub fn matched_rule_id(&self) -> Option<&str> {
        self.rule.and_then(|rule| rule.id.as_deref())
    }
}

/// Evaluate rules against a context, returning the first match
pub fn evaluate_rules<'a>(
    rules: &'a [TargetingRule],
    ctx: &EvaluationContext,
) -> MatchResult<'a> {
    let mut ordered: Vec<&TargetingRule> = rules.iter().collect();
    // Stable sort: equal priorities keep their definition order
    ordered.sort_by_key(|rule| Reverse(rule.priority));

    for rule in ordered {
        if rule_matches(&rule.attribute, rule.operator, &rule.value, ctx) {
            return MatchResult::matched(rule);
        }
    }

    MatchResult::no_match()
}

/// Evaluate a single condition against a context
///
/// Shared by targeting rules, flag rules and segment rules.
pub(crate) fn rule_matches(
    attribute: &str,
    operator: RuleOperator,
    value: &AttributeValue,
    ctx: &EvaluationContext,
) -> bool {
    let attr = ctx.get(attribute);

    // Presence checks ignore the rule value entirely
    match operator {
        RuleOperator::Exists => return attr.is_some(),
        RuleOperator::NotExists => return attr.is_none(),
        _ => {}
    }

    // Absent attribute: fail closed for every value-reading operator,
    // including the negated ones
    let Some(attr) = attr else {
        return false;
    };

    match operator {
        RuleOperator::Equals => attr == value,
        RuleOperator::NotEquals => attr != value,
        RuleOperator::Contains => contains(attr, value),
        RuleOperator::NotContains => !contains(attr, value),
        RuleOperator::GreaterThan => numeric_cmp(attr, value) == Some(Ordering::Greater),
        RuleOperator::LessThan => numeric_cmp(attr, value) == Some(Ordering::Less),
        RuleOperator::In => in_set(attr, value),
        RuleOperator::NotIn => !in_set(attr, value),
        RuleOperator::Regex => regex_matches(attr, value),
        // Handled above
        RuleOperator::Exists | RuleOperator::NotExists => false,
    }
}

/// Substring test for strings, membership test for string sets
fn contains(attr: &AttributeValue, value: &AttributeValue) -> bool {
    match attr {
        AttributeValue::String(s) => value
            .scalar_string()
            .map(|needle| s.contains(needle.as_ref()))
            .unwrap_or(false),
        AttributeValue::StringSet(set) => value
            .scalar_string()
            .map(|needle| set.contains(needle.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

/// Numeric comparison, coercing numeric strings on either side
fn numeric_cmp(attr: &AttributeValue, value: &AttributeValue) -> Option<Ordering> {
    let lhs = attr.as_number()?;
    let rhs = value.as_number()?;
    lhs.partial_cmp(&rhs)
}

/// Membership of the attribute's scalar form in the rule's value set
///
/// A scalar rule value acts as a set of one.
fn in_set(attr: &AttributeValue, value: &AttributeValue) -> bool {
    let Some(needle) = attr.scalar_string() else {
        return false;
    };

    match value {
        AttributeValue::StringSet(set) => set.contains(needle.as_ref()),
        scalar => scalar
            .scalar_string()
            .map(|s| s == needle)
            .unwrap_or(false),
    }
}

/// Compiled pattern test against a string attribute
///
/// An invalid pattern is a configuration mistake isolated to this rule: it
/// is logged and treated as a non-match, never a fatal evaluation error.
fn regex_matches(attr: &AttributeValue, value: &AttributeValue) -> bool {
    let Some(subject) = attr.as_str() else {
        return false;
    };
    let Some(pattern) = value.as_str() else {
        return false;
    };

    match Regex::new(pattern) {
        Ok(re) => re.is_match(subject),
        Err(error) => {
            debug!(pattern, %error, "invalid regex in targeting rule, treating as non-match");
            false
        }
    }
}
