//! Runtime support for lifecycle-managed processing components

pub mod controller;
pub mod counters;
pub mod errors;
pub mod events;
pub mod limiter;
pub mod ports;
pub mod processor;
pub mod properties;
pub mod receiver;
pub mod sender;
pub mod signal;
pub mod state;
pub mod watchdog;
pub mod worker;

pub use controller::Component;
pub use counters::{CounterSnapshot, SharedState, WorkerStatus};
pub use errors::{LifecycleError, ProcessingError, PropertyError, RegistrationError, ResourceError};
pub use events::{EventChannelManager, Publisher, Subscriber};
pub use limiter::{Backlog, OverflowPolicy, RateLimiter};
pub use ports::{
    ChannelInput, ChannelMessage, ChannelOutput, InputSource, Intake, OutputSink, PortDirection,
    PortSchema, Rejected, port_channel,
};
pub use processor::{FnProcessor, Processor, from_fn};
pub use properties::{ComponentProperties, PropertyFile, PropertySource, PropertyValue, ids};
pub use signal::{StopSignal, StopTrigger, stop_signal};
pub use state::{ComponentState, Operation};
pub use watchdog::Watchdog;
pub use worker::WorkerExit;
