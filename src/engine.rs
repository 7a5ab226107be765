//! Engine facade
//!
//! A thin, stateless entry point bundling the evaluation operations behind
//! one type. Every method is a pure function of its arguments; the facade
//! holds no caches or connections, so one instance can be shared freely
//! across threads.

use crate::domain::context::EvaluationContext;
use crate::domain::error::EngineError;
use crate::domain::experiment::{
    AssignmentOutcome, Experiment, assign, start_experiment, validate_experiment,
};
use crate::domain::flag::{EvaluationResult, FeatureFlag, evaluate_flag};
use crate::domain::targeting::{MatchResult, TargetingRule, evaluate_rules};
use crate::infrastructure::statistics::{
    SampleSummary, SignificanceResult, compute_significance, compute_statistics,
};

/// Stateless facade over experiment assignment, flag evaluation and
/// result analysis
#[derive(Debug, Clone, Copy, Default)]
pub struct ExperimentEngine;

impl ExperimentEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Deterministically assign the context's user to an experiment variant
    pub fn assign(
        &self,
        experiment: &Experiment,
        ctx: &EvaluationContext,
    ) -> Result<AssignmentOutcome, EngineError> {
        assign(experiment, ctx)
    }

    /// Resolve a feature flag for a context; never fails
    pub fn evaluate_flag(
        &self,
        flag: &FeatureFlag,
        ctx: &EvaluationContext,
        environment: Option<&str>,
    ) -> EvaluationResult {
        evaluate_flag(flag, ctx, environment)
    }

    /// Evaluate a standalone rule set against a context
    pub fn evaluate_rules<'a>(
        &self,
        rules: &'a [TargetingRule],
        ctx: &EvaluationContext,
    ) -> MatchResult<'a> {
        evaluate_rules(rules, ctx)
    }

    /// Validate an experiment's configuration invariants
    pub fn validate_experiment(&self, experiment: &Experiment) -> Result<(), EngineError> {
        validate_experiment(experiment)
            .map_err(|error| EngineError::invalid_configuration(error.to_string()))
    }

    /// Validate, arbitrate mutual exclusion, and start an experiment
    pub fn start_experiment(
        &self,
        candidate: Experiment,
        group_members: &[Experiment],
    ) -> Result<Experiment, EngineError> {
        start_experiment(candidate, group_members)
    }

    /// Summarize a stream of metric observations in one pass
    pub fn compute_statistics(&self, values: impl IntoIterator<Item = f64>) -> SampleSummary {
        compute_statistics(values)
    }

    /// Run a two-tailed z-test comparing treatment against control
    pub fn compute_significance(
        &self,
        control: &SampleSummary,
        treatment: &SampleSummary,
        metric: &crate::domain::experiment::Metric,
    ) -> Result<SignificanceResult, EngineError> {
        compute_significance(control, treatment, metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{ExperimentId, Variant, VariantId};
    use serde_json::json;

    fn experiment() -> Experiment {
        Experiment::new(ExperimentId::new("checkout-test").unwrap(), "Checkout")
            .with_variant(
                Variant::new(VariantId::new("control").unwrap(), "Control", 50.0)
                    .with_control(true),
            )
            .with_variant(Variant::new(
                VariantId::new("treatment").unwrap(),
                "Treatment",
                50.0,
            ))
    }

    #[test]
    fn test_end_to_end_assignment_flow() {
        let engine = ExperimentEngine::new();
        let started = engine.start_experiment(experiment(), &[]).unwrap();

        let ctx = EvaluationContext::new("user-1");
        let outcome = engine.assign(&started, &ctx).unwrap();
        assert!(outcome.is_assigned());
    }

    #[test]
    fn test_end_to_end_flag_flow() {
        let engine = ExperimentEngine::new();
        let flag = FeatureFlag::new("dark-mode", json!(false)).with_percentage(100.0);

        let ctx = EvaluationContext::new("user-1");
        let result = engine.evaluate_flag(&flag, &ctx, Some("production"));
        assert_eq!(
            result.reason,
            crate::domain::flag::EvaluationReason::PercentageRollout
        );
    }

    #[test]
    fn test_end_to_end_analysis_flow() {
        let engine = ExperimentEngine::new();
        let control = engine.compute_statistics((0..500).map(|i| f64::from(i % 2)));
        let treatment = engine.compute_statistics((0..500).map(|i| f64::from((i % 5 == 0) as u8)));

        let metric = crate::domain::experiment::Metric::new("conversion", "purchase");
        let result = engine
            .compute_significance(&control, &treatment, &metric)
            .unwrap();
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }
}
