//! Lifecycle state machine
//!
//! ```text
//! CREATED --start--> STARTED --stop--> STOPPED --start--> STARTED
//! CREATED | STARTED | STOPPED --releaseObject--> RELEASED (terminal)
//! ```

use super::errors::LifecycleError;
use std::fmt;

/// Lifecycle state of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    Created,
    Started,
    Stopped,
    Released,
}

/// Control-path operations that are gated by the lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    Stop,
    Release,
    LoadProperties,
    Configure,
}

impl ComponentState {
    /// Resolve the state reached by applying `operation`.
    ///
    /// Property operations leave the state unchanged but are only legal
    /// while no worker is running.
    pub fn transition(self, operation: Operation) -> Result<ComponentState, LifecycleError> {
        use ComponentState::*;
        use Operation::*;

        match (self, operation) {
            (Created | Stopped, Start) => Ok(Started),
            (Started, Stop) => Ok(Stopped),
            (Created | Started | Stopped, Release) => Ok(Released),
            (Created | Stopped, LoadProperties | Configure) => Ok(self),
            (state, operation) => Err(LifecycleError::InvalidTransition { operation, state }),
        }
    }

    pub fn is_released(self) -> bool {
        self == ComponentState::Released
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ComponentState::Created => "CREATED",
            ComponentState::Started => "STARTED",
            ComponentState::Stopped => "STOPPED",
            ComponentState::Released => "RELEASED",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Release => "releaseObject",
            Operation::LoadProperties => "loadProperties",
            Operation::Configure => "configure",
        };
        f.write_str(name)
    }
}
