//! Mutual exclusion arbitration
//!
//! At most one experiment per group may be running. The check happens at
//! start time against a snapshot of the group's members, so the per-request
//! assignment path stays a pure function of a single experiment's config.
//! Contention is pushed onto the rare start operation; callers wrap the
//! start in whatever transactional write their store provides.

use tracing::info;

use super::entity::Experiment;
use super::validation::validate_experiment;
use crate::domain::error::EngineError;

/// Check that starting `candidate` would not violate mutual exclusion
///
/// `group_members` is the caller's snapshot of experiments sharing the
/// candidate's group; experiments outside the group (or the candidate
/// itself) are ignored.
pub fn check_exclusive_start(
    candidate: &Experiment,
    group_members: &[Experiment],
) -> Result<(), EngineError> {
    if !candidate.is_exclusive() {
        return Ok(());
    }
    let Some(group_id) = candidate.mutual_exclusion_group_id() else {
        return Ok(());
    };

    for member in group_members {
        if member.id() == candidate.id() {
            continue;
        }
        if member.mutual_exclusion_group_id() == Some(group_id) && member.status().is_running() {
            return Err(EngineError::conflict(format!(
                "experiment '{}' in mutual exclusion group '{}' is already running",
                member.id(),
                group_id
            )));
        }
    }

    Ok(())
}

/// Validate, arbitrate and start an experiment
///
/// Runs full config validation, the mutual exclusion check, and the status
/// transition, returning the started experiment. Existing assignments in
/// other experiments are untouched; assignments are derived, not stored,
/// by this engine.
pub fn start_experiment(
    mut candidate: Experiment,
    group_members: &[Experiment],
) -> Result<Experiment, EngineError> {
    validate_experiment(&candidate)
        .map_err(|error| EngineError::invalid_configuration(error.to_string()))?;
    check_exclusive_start(&candidate, group_members)?;
    candidate
        .start()
        .map_err(|error| EngineError::conflict(error.to_string()))?;

    info!(experiment_id = %candidate.id(), "Experiment started");
    Ok(candidate)
}
