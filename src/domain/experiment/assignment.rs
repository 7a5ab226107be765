//! Deterministic variant assignment
//!
//! Assignment is a pure function of (experiment config, user context): no
//! shared state, no locks, no I/O. An `Assignment` is a re-derivable cache
//! of that function's output, so N stateless servers agree without
//! coordination as long as they hold the same config snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entity::Experiment;
use crate::domain::context::EvaluationContext;
use crate::domain::error::EngineError;
use crate::domain::targeting::evaluate_rules;
use crate::infrastructure::hashing::{BUCKET_COUNT, Bucketer};

/// Suffix used to derive the traffic-allocation bucket
///
/// Allocation uses a second, independent bucket so the allocated population
/// is uncorrelated with the variant ranges.
const ALLOCATION_SUFFIX: &str = ":alloc";

// ============================================================================
// Assignment
// ============================================================================

/// A user's assignment to an experiment variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// ID of the experiment
    pub experiment_id: String,
    /// ID of the assigned variant
    pub variant_id: String,
    /// ID of the bucketing unit (usually the user)
    pub user_id: String,
    /// Raw bucket value, retained for audit and debugging
    pub hash_key: u32,
    /// When the assignment was derived
    pub assigned_at: DateTime<Utc>,
}

/// Why a user is not eligible for assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotEligibleReason {
    /// The experiment is not in Running status
    NotRunning,
    /// Targeting rules exist and none matched
    NotTargeted,
    /// The user's allocation bucket falls outside the traffic allocation
    NotInTrafficAllocation,
}

/// Outcome of an assignment call
///
/// Ineligibility is a typed absence of result, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Assigned(Assignment),
    NotEligible { reason: NotEligibleReason },
}

impl AssignmentOutcome {
    /// Check whether a variant was assigned
    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    /// Get the assignment, if one was produced
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Self::Assigned(assignment) => Some(assignment),
            Self::NotEligible { .. } => None,
        }
    }

    /// Get the ineligibility reason, if no assignment was produced
    pub fn not_eligible_reason(&self) -> Option<NotEligibleReason> {
        match self {
            Self::Assigned(_) => None,
            Self::NotEligible { reason } => Some(*reason),
        }
    }
}

// ============================================================================
// Assignment function
// ============================================================================

/// Deterministically assign the context's user to a variant
///
/// The pipeline is: running check, targeting gate, traffic allocation,
/// variant selection. Each stage is pure; repeated calls with the same
/// inputs return the same variant. The only error is a malformed config
/// (no variants), which indicates an upstream authoring bug.
pub fn assign(
    experiment: &Experiment,
    ctx: &EvaluationContext,
) -> Result<AssignmentOutcome, EngineError> {
    if !experiment.status().is_running() {
        return Ok(not_eligible(experiment, ctx, NotEligibleReason::NotRunning));
    }

    if !experiment.targeting_rules().is_empty()
        && !evaluate_rules(experiment.targeting_rules(), ctx).matched
    {
        return Ok(not_eligible(experiment, ctx, NotEligibleReason::NotTargeted));
    }

    let allocation_scale = f64::from(BUCKET_COUNT) / 100.0;
    let allocation_subject = format!("{}{}", experiment.id(), ALLOCATION_SUFFIX);
    let allocation_bucket = Bucketer::bucket(&allocation_subject, ctx.user_id());
    if f64::from(allocation_bucket) >= experiment.traffic_allocation() * allocation_scale {
        return Ok(not_eligible(
            experiment,
            ctx,
            NotEligibleReason::NotInTrafficAllocation,
        ));
    }

    let hash_key = Bucketer::bucket(experiment.id().as_str(), ctx.user_id());
    let variant = experiment.variant_for_bucket(hash_key).ok_or_else(|| {
        EngineError::invalid_configuration(format!(
            "experiment '{}' has no variants",
            experiment.id()
        ))
    })?;

    debug!(
        experiment_id = %experiment.id(),
        variant_id = %variant.id(),
        user_id = %ctx.user_id(),
        hash_key,
        "Assigned variant"
    );

    Ok(AssignmentOutcome::Assigned(Assignment {
        experiment_id: experiment.id().to_string(),
        variant_id: variant.id().to_string(),
        user_id: ctx.user_id().to_string(),
        hash_key,
        assigned_at: Utc::now(),
    }))
}

fn not_eligible(
    experiment: &Experiment,
    ctx: &EvaluationContext,
    reason: NotEligibleReason,
) -> AssignmentOutcome {
    debug!(
        experiment_id = %experiment.id(),
        user_id = %ctx.user_id(),
        ?reason,
        "User not eligible for assignment"
    );
    AssignmentOutcome::NotEligible { reason }
}
