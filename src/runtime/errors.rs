//! Error types for the component runtime
//!
//! Only [`LifecycleError`] crosses the controller boundary. [`ProcessingError`]
//! and [`ResourceError`] stay inside the worker loop and surface through
//! counters and logs.

use super::state::{ComponentState, Operation};

/// Error type for lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: Operation,
        state: ComponentState,
    },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),

    #[error("worker resources were lost after a worker thread panic")]
    ResourcesLost,
}

impl LifecycleError {
    /// True for out-of-order lifecycle calls
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, LifecycleError::InvalidTransition { .. })
    }
}

/// Error raised by a pluggable processing step
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("processing failed: {0}")]
    Failed(String),
}

/// Transient failure acquiring input or emitting output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    #[error("output rejected: {0}")]
    OutputRejected(String),

    #[error("port disconnected")]
    Disconnected,
}

/// Error type for property access and configuration loading
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("unknown property '{0}'")]
    Unknown(String),

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error("invalid value '{value}' for property '{id}'")]
    InvalidValue { id: String, value: String },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Error type for event channel registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("'{registrant}' is already registered as {role} on channel '{channel}'")]
    Exists {
        registrant: String,
        channel: String,
        role: &'static str,
    },

    #[error("registration failed: {0}")]
    Failed(String),
}
