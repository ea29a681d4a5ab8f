//! Lifecycle and execution core for streaming SDR components
//!
//! A component receives units on an input port, runs them through a
//! pluggable processing step and emits the results on an output port, while
//! exposing counters and a message limit that management tooling can inspect
//! and tune.
//!
//! # Architecture
//!
//! - **Component**: lifecycle state machine (CREATED, STARTED, STOPPED, RELEASED)
//!   owning the worker thread and its resources
//! - **Worker loop**: intake, processing, rate-limited emission, with bounded
//!   interruptible waits and retry back-off
//! - **Shared state**: atomic counters read by the control path while the
//!   worker mutates them
//! - **Event channels**: named in-process publish/subscribe, usable as ports
//!
//! # Example
//!
//! ```no_run
//! use ecm_component::{Component, ComponentProperties, port_channel, processors::Passthrough};
//!
//! let (feed, input) = port_channel::<u32>(64);
//! let (output, _results) = port_channel::<u32>(64);
//! let mut component = Component::new("ecm", Passthrough::new(), input, output)
//!     .with_properties(ComponentProperties::default().with_message_limit(5))?;
//!
//! component.start()?;
//! feed.send(1).ok();
//! component.stop()?;
//! component.release_object()?;
//! # Ok::<(), ecm_component::Error>(())
//! ```

use thiserror::Error;

pub mod processors;
pub mod runtime;

// Re-export the component surface
pub use runtime::{
    Component, ComponentProperties, ComponentState, CounterSnapshot, InputSource, Intake,
    OutputSink, PortDirection, PortSchema, Processor, PropertyFile, PropertySource, PropertyValue,
    WorkerExit, WorkerStatus, port_channel,
};

// Re-export error types
pub use runtime::{LifecycleError, ProcessingError, PropertyError, RegistrationError, ResourceError};

// Re-export event channels
pub use runtime::{EventChannelManager, Publisher, Subscriber};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
}

pub type Result<T> = std::result::Result<T, Error>;
