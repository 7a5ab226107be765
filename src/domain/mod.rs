//! Domain layer - Core business logic and entities

pub mod context;
pub mod error;
pub mod experiment;
pub mod flag;
pub mod targeting;

pub use context::{AttributeValue, EvaluationContext};
pub use error::EngineError;
pub use experiment::{
    AggregationType, Assignment, AssignmentOutcome, Experiment, ExperimentId, ExperimentStatus,
    ExperimentValidationError, Metric, MutualExclusionGroup, NotEligibleReason, Variant,
    VariantId, assign, check_exclusive_start, start_experiment, validate_experiment,
};
pub use flag::{
    EvaluationReason, EvaluationResult, FeatureFlag, FlagRule, FlagSegment, UserSegment,
    evaluate_flag,
};
pub use targeting::{MatchResult, RuleOperator, TargetingRule, evaluate_rules};
