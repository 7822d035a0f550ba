//! Error types for the profiling core
//!
//! Timer misuse is a programmer error and is surfaced immediately. Rendering
//! failures exist only so the host boundary can fall back to the original
//! response body.

use thiserror::Error;

/// Errors raised by timer and report operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("Timer '{name}' is already running")]
    DuplicateTimer { name: String },

    #[error("Timer '{name}' was never started")]
    UnknownTimer { name: String },

    #[error("Timer '{name}' has not been stopped")]
    TimerNotStopped { name: String },

    #[error("Failed to render report: {0}")]
    Render(String),
}

impl ProfilerError {
    pub(crate) fn duplicate(name: &str) -> Self {
        Self::DuplicateTimer {
            name: name.to_string(),
        }
    }

    pub(crate) fn unknown(name: &str) -> Self {
        Self::UnknownTimer {
            name: name.to_string(),
        }
    }

    pub(crate) fn not_stopped(name: &str) -> Self {
        Self::TimerNotStopped {
            name: name.to_string(),
        }
    }
}

impl From<std::fmt::Error> for ProfilerError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<serde_json::Error> for ProfilerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

/// Result type for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;
