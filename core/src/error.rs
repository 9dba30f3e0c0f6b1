//! Engine error types
//!
//! Every public registry operation returns a structured `EngineError`; no
//! panic crosses the encounter boundary. Variants group into five kinds that
//! the session layer maps onto its own wire codes, plus a terse user-facing
//! message per variant.

use thiserror::Error;

use crate::encounter::{EncounterId, EncounterStatus};

/// Broad classification of an engine error, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    PrerequisiteNotMet,
    DuplicateActive,
    /// Internal only; surfaced to callers as a retry, never as a failure.
    ConcurrencyConflict,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("encounter definition '{0}' not found")]
    DefinitionNotFound(String),

    #[error("encounter {0} not found")]
    EncounterNotFound(EncounterId),

    #[error("ability '{0}' not found")]
    AbilityNotFound(String),

    #[error("cannot {action} while encounter is {status:?}")]
    InvalidState {
        action: &'static str,
        status: EncounterStatus,
    },

    #[error("ability '{0}' is on cooldown")]
    AbilityOnCooldown(String),

    #[error("participant {0} is stunned")]
    Stunned(i64),

    #[error("player level {level} is below the required {required}")]
    LevelTooLow { level: u16, required: u16 },

    #[error("player {0} is not a participant of this encounter")]
    NotAParticipant(i64),

    #[error("an active instance of '{0}' already exists")]
    DuplicateActive(String),

    #[error("conflicting concurrent update; retry")]
    ConcurrencyConflict,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DefinitionNotFound(_)
            | Self::EncounterNotFound(_)
            | Self::AbilityNotFound(_) => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::AbilityOnCooldown(_) | Self::Stunned(_) => {
                ErrorKind::InvalidState
            }
            Self::LevelTooLow { .. } | Self::NotAParticipant(_) => ErrorKind::PrerequisiteNotMet,
            Self::DuplicateActive(_) => ErrorKind::DuplicateActive,
            Self::ConcurrencyConflict => ErrorKind::ConcurrencyConflict,
        }
    }

    /// Terse, actionable string for direct display to a player.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DefinitionNotFound(_) => "unknown encounter",
            Self::EncounterNotFound(_) => "encounter no longer exists",
            Self::AbilityNotFound(_) => "unknown ability",
            Self::InvalidState { .. } => "not available right now",
            Self::AbilityOnCooldown(_) => "on cooldown",
            Self::Stunned(_) => "stunned",
            Self::LevelTooLow { .. } => "level too low",
            Self::NotAParticipant(_) => "join the encounter first",
            Self::DuplicateActive(_) => "already in progress",
            Self::ConcurrencyConflict => "try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            EngineError::DefinitionNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::AbilityOnCooldown("x".into()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            EngineError::LevelTooLow {
                level: 3,
                required: 10
            }
            .kind(),
            ErrorKind::PrerequisiteNotMet
        );
        assert_eq!(
            EngineError::DuplicateActive("x".into()).kind(),
            ErrorKind::DuplicateActive
        );
    }

    #[test]
    fn user_messages_are_terse() {
        let err = EngineError::LevelTooLow {
            level: 3,
            required: 10,
        };
        assert_eq!(err.user_message(), "level too low");
    }
}
