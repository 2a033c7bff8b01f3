//! Core error types for focusfence-core.
//!
//! Command errors are never fatal: a missing session or a malformed preset only
//! prevents that one operation. Spatial violations are not errors at all, they
//! are returned as [`crate::Decision::Deny`].

use std::path::PathBuf;
use thiserror::Error;

use crate::position::SubjectId;
use crate::session::Phase;

/// Core error type for focusfence-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// No live session for the subject
    #[error("No session for subject {subject}")]
    NotFound { subject: SubjectId },

    /// Command not valid in the session's current phase
    #[error("Cannot {command} while {phase}")]
    InvalidPhase {
        command: &'static str,
        phase: Phase,
    },

    /// The subject's position could not be read
    #[error("Position unavailable for subject {subject}")]
    PositionUnavailable { subject: SubjectId },

    /// No preset registered under the key
    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Invalid preset: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config: {0}")]
    Config(#[from] ConfigError),

    /// Stats or subject preset storage failed
    #[error("Storage: {0}")]
    Database(#[from] DatabaseError),

    /// The scheduler task is no longer running
    #[error("Scheduler has shut down")]
    SchedulerClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Preset and input validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A duration field was zero
    #[error("Invalid value for '{field}': duration must be greater than zero")]
    NonPositiveDuration { field: &'static str },

    /// Cycle length was zero
    #[error("Invalid value for 'cycle_length': must be greater than zero")]
    ZeroCycleLength,

    /// Blank or overlong preset name
    #[error("Invalid preset name '{name}': must be 1-{max} non-blank characters")]
    InvalidName { name: String, max: usize },
}

/// Errors reading or writing `config.toml`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unreadable or unparsable config file
    #[error("Cannot read {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Cannot write {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-separated key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value does not fit the key's type
    #[error("Bad value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be created
    #[error("Cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// SQLite storage errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open stats database {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQL: {0}")]
    QueryFailed(String),

    /// Another process holds the write lock
    #[error("Stats database busy")]
    Locked,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::DatabaseBusy) {
            return DatabaseError::Locked;
        }
        DatabaseError::QueryFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_phase_message_names_command_and_phase() {
        let err = CoreError::InvalidPhase {
            command: "resume",
            phase: Phase::Work,
        };
        assert_eq!(err.to_string(), "Cannot resume while work");
    }

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::ZeroCycleLength.into();
        assert!(matches!(err, CoreError::Validation(ValidationError::ZeroCycleLength)));
    }
}
