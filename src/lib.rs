//! Experiment Engine
//!
//! A deterministic A/B testing and feature flag evaluation library:
//! - Stable hash-based bucketing, identical across hosts and releases
//! - Weighted variant assignment with traffic allocation and targeting
//! - Feature flags with environments, rules, segments and rollouts
//! - Mutual exclusion between overlapping experiments
//! - Streaming metric aggregation and two-tailed significance testing

pub mod domain;
pub mod engine;
pub mod infrastructure;

pub use domain::{
    AssignmentOutcome, AttributeValue, EngineError, EvaluationContext, EvaluationReason,
    EvaluationResult, Experiment, ExperimentId, ExperimentStatus, FeatureFlag, Metric,
    RuleOperator, TargetingRule, Variant, VariantId,
};
pub use engine::ExperimentEngine;
pub use infrastructure::hashing::{BUCKET_COUNT, Bucketer};
pub use infrastructure::statistics::{
    SampleAccumulator, SampleSummary, SignificanceResult, compute_significance, compute_statistics,
};
