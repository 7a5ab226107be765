//! Experiment domain module
//!
//! Experiments split traffic between weighted variants, gated by targeting
//! rules and a traffic allocation percentage. Assignment is deterministic
//! and stateless; lifecycle and mutual exclusion are arbitrated at start
//! time.

mod assignment;
mod entity;
mod exclusion;
mod validation;

// Re-export all public types
pub use assignment::{Assignment, AssignmentOutcome, NotEligibleReason, assign};
pub use entity::{
    AggregationType, Experiment, ExperimentId, ExperimentStatus, Metric, MutualExclusionGroup,
    Variant, VariantId,
};
pub use exclusion::{check_exclusive_start, start_experiment};
pub use validation::{
    ExperimentValidationError, IdKind, MAX_ID_LENGTH, WEIGHT_SUM_TOLERANCE, validate_experiment,
    validate_id,
};
