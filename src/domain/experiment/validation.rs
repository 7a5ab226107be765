//! Experiment configuration validation
//!
//! Config invariants are enforced here, at authoring and start time, not
//! re-checked per evaluation call. The evaluation path assumes a valid
//! snapshot and raises a loud `InvalidConfiguration` only when it trips over
//! something this module would have rejected.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use super::entity::Experiment;

/// Maximum length for experiment and variant IDs
pub const MAX_ID_LENGTH: usize = 64;

/// Tolerance when checking that variant weights sum to 100
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Which kind of ID failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Experiment,
    Variant,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Experiment => write!(f, "experiment"),
            Self::Variant => write!(f, "variant"),
        }
    }
}

/// Validation errors for experiment configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExperimentValidationError {
    #[error("{0} ID cannot be empty")]
    EmptyId(IdKind),

    #[error("{0} ID exceeds maximum length of {MAX_ID_LENGTH} characters")]
    IdTooLong(IdKind),

    #[error("{0} ID must start and end with a letter or number")]
    InvalidIdBoundary(IdKind),

    #[error("{kind} ID contains invalid character: '{character}'")]
    InvalidIdCharacter { kind: IdKind, character: char },

    #[error("{0} ID cannot contain consecutive hyphens")]
    ConsecutiveHyphens(IdKind),

    #[error("Experiment must have at least 2 variants")]
    InsufficientVariants,

    #[error("Variant weights must sum to 100, got {0}")]
    InvalidWeightSum(f64),

    #[error("Variant '{variant}' has weight outside [0, 100]: {weight}")]
    InvalidWeight { variant: String, weight: f64 },

    #[error("Experiment must have exactly one control variant, got {0}")]
    ControlVariantCount(usize),

    #[error("Duplicate variant ID: '{0}'")]
    DuplicateVariantId(String),

    #[error("Traffic allocation must be within [0, 100], got {0}")]
    InvalidTrafficAllocation(f64),

    #[error("Primary metric '{0}' does not reference a defined metric")]
    UnknownPrimaryMetric(String),

    #[error("Metric '{metric}' has confidence level outside (0, 1): {confidence_level}")]
    InvalidConfidenceLevel {
        metric: String,
        confidence_level: f64,
    },

    #[error("Exclusive experiment must reference a mutual exclusion group")]
    ExclusiveWithoutGroup,

    #[error("Invalid experiment status transition from {0} to {1}")]
    InvalidStatusTransition(String, String),

    #[error("Variant set is frozen while experiment is {0}")]
    VariantsFrozen(String),
}

/// Validate an experiment or variant ID
///
/// IDs are kebab-case: ASCII alphanumerics and single hyphens, starting and
/// ending with an alphanumeric.
pub fn validate_id(kind: IdKind, id: &str) -> Result<(), ExperimentValidationError> {
    if id.is_empty() {
        return Err(ExperimentValidationError::EmptyId(kind));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ExperimentValidationError::IdTooLong(kind));
    }

    let starts_ok = id.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends_ok = id.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_ok || !ends_ok {
        return Err(ExperimentValidationError::InvalidIdBoundary(kind));
    }

    let mut prev_was_hyphen = false;
    for character in id.chars() {
        if character == '-' {
            if prev_was_hyphen {
                return Err(ExperimentValidationError::ConsecutiveHyphens(kind));
            }
            prev_was_hyphen = true;
        } else if character.is_ascii_alphanumeric() {
            prev_was_hyphen = false;
        } else {
            return Err(ExperimentValidationError::InvalidIdCharacter { kind, character });
        }
    }

    Ok(())
}

/// Validate the full set of experiment configuration invariants
pub fn validate_experiment(experiment: &Experiment) -> Result<(), ExperimentValidationError> {
    let variants = experiment.variants();

    if variants.len() < 2 {
        return Err(ExperimentValidationError::InsufficientVariants);
    }

    let mut seen = HashSet::new();
    for variant in variants {
        if !seen.insert(variant.id().as_str()) {
            return Err(ExperimentValidationError::DuplicateVariantId(
                variant.id().to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&variant.weight()) {
            return Err(ExperimentValidationError::InvalidWeight {
                variant: variant.id().to_string(),
                weight: variant.weight(),
            });
        }
    }

    let weight_sum: f64 = variants.iter().map(|v| v.weight()).sum();
    if (weight_sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ExperimentValidationError::InvalidWeightSum(weight_sum));
    }

    let control_count = variants.iter().filter(|v| v.is_control()).count();
    if control_count != 1 {
        return Err(ExperimentValidationError::ControlVariantCount(control_count));
    }

    if !(0.0..=100.0).contains(&experiment.traffic_allocation()) {
        return Err(ExperimentValidationError::InvalidTrafficAllocation(
            experiment.traffic_allocation(),
        ));
    }

    if let Some(primary) = experiment.primary_metric() {
        if experiment.metric(primary).is_none() {
            return Err(ExperimentValidationError::UnknownPrimaryMetric(
                primary.to_string(),
            ));
        }
    }

    for metric in experiment.metrics() {
        if !(0.0..1.0).contains(&metric.confidence_level())
            || metric.confidence_level() == 0.0
        {
            return Err(ExperimentValidationError::InvalidConfidenceLevel {
                metric: metric.key().to_string(),
                confidence_level: metric.confidence_level(),
            });
        }
    }

    if experiment.is_exclusive() && experiment.mutual_exclusion_group_id().is_none() {
        return Err(ExperimentValidationError::ExclusiveWithoutGroup);
    }

    Ok(())
}
