//! Core engine errors

use thiserror::Error;

/// Errors surfaced by the evaluation engine.
///
/// Runtime evaluation never produces these: rule matching converts internal
/// failures into non-matches and flag evaluation converts them into a
/// `reason = Error` result. `InvalidConfiguration` signals an upstream
/// authoring bug and is raised loudly instead of being guessed around;
/// `Conflict` is produced by start-time arbitration only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl EngineError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}
