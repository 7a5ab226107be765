//! Feature flag evaluation orchestrator
//!
//! Resolution walks a fixed precedence chain and always produces a value:
//! disabled check, environment override, targeting rules, segments,
//! percentage rollout, default. Any internal failure is absorbed into a
//! `Error` result carrying the flag's default value, so a bad rule can
//! never take a request path down with it.

use std::cmp::Reverse;

use tracing::{debug, warn};

use super::entity::FeatureFlag;
use super::evaluation::{EvaluationReason, EvaluationResult};
use crate::domain::context::EvaluationContext;
use crate::domain::error::EngineError;
use crate::domain::targeting::rule_matches;
use crate::infrastructure::hashing::{BUCKET_COUNT, Bucketer};

/// Evaluate a flag for a context
///
/// This function never fails; the `Error` reason is the failure channel.
pub fn evaluate_flag(
    flag: &FeatureFlag,
    ctx: &EvaluationContext,
    environment: Option<&str>,
) -> EvaluationResult {
    // The kill switch is checked outside the fallible path so it works even
    // when the rest of the config is malformed.
    if !flag.is_enabled() {
        return resolved(flag, ctx, flag.default_value().clone(), EvaluationReason::FlagDisabled);
    }

    match evaluate_steps(flag, ctx, environment) {
        Ok(result) => result,
        Err(error) => {
            warn!(
                flag_key = flag.key(),
                user_id = %ctx.user_id(),
                %error,
                "Flag evaluation failed, serving default value"
            );
            EvaluationResult::new(flag.default_value().clone(), EvaluationReason::Error)
        }
    }
}

fn evaluate_steps(
    flag: &FeatureFlag,
    ctx: &EvaluationContext,
    environment: Option<&str>,
) -> Result<EvaluationResult, EngineError> {
    if let Some(environment) = environment {
        if flag.environment(environment) == Some(false) {
            return Ok(resolved(
                flag,
                ctx,
                flag.default_value().clone(),
                EvaluationReason::EnvironmentMatch,
            ));
        }
    }

    // Targeting rules: highest priority first, definition order on ties
    let mut rules: Vec<_> = flag.rules().iter().filter(|r| r.is_enabled()).collect();
    rules.sort_by_key(|r| Reverse(r.rule().priority));
    for flag_rule in rules {
        let rule = flag_rule.rule();
        if rule_matches(&rule.attribute, rule.operator, &rule.value, ctx) {
            let result = resolved(
                flag,
                ctx,
                flag_rule.return_value().clone(),
                EvaluationReason::TargetingMatch,
            );
            return Ok(result.with_matched_rule(rule.id.clone()));
        }
    }

    for flag_segment in flag.segments() {
        if flag_segment.segment().contains(ctx) {
            return Ok(resolved(
                flag,
                ctx,
                flag_segment.return_value().clone(),
                EvaluationReason::SegmentMatch,
            ));
        }
    }

    if let Some(percentage) = flag.percentage_enabled() {
        if !(0.0..=100.0).contains(&percentage) {
            return Err(EngineError::invalid_configuration(format!(
                "flag '{}' has rollout percentage outside [0, 100]: {}",
                flag.key(),
                percentage
            )));
        }

        let bucket = Bucketer::bucket(flag.key(), ctx.user_id());
        let threshold = percentage * f64::from(BUCKET_COUNT) / 100.0;
        if f64::from(bucket) < threshold {
            let value = flag
                .rollout_value()
                .cloned()
                .unwrap_or_else(|| flag.default_value().clone());
            return Ok(resolved(flag, ctx, value, EvaluationReason::PercentageRollout));
        }
        return Ok(resolved(
            flag,
            ctx,
            flag.default_value().clone(),
            EvaluationReason::UserNotInRollout,
        ));
    }

    Ok(resolved(
        flag,
        ctx,
        flag.default_value().clone(),
        EvaluationReason::DefaultValue,
    ))
}

fn resolved(
    flag: &FeatureFlag,
    ctx: &EvaluationContext,
    value: serde_json::Value,
    reason: EvaluationReason,
) -> EvaluationResult {
    debug!(
        flag_key = flag.key(),
        user_id = %ctx.user_id(),
        ?reason,
        "Flag resolved"
    );
    EvaluationResult::new(value, reason)
}
