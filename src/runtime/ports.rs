//! Port abstractions for the worker loop
//!
//! The worker consumes an [`InputSource`] and feeds an [`OutputSink`]; the
//! transport behind them belongs to whoever wires the component up. The
//! crossbeam-backed [`ChannelInput`] and [`ChannelOutput`] cover the common
//! in-process case, and [`PortSchema`] describes ports for introspection.

use super::errors::ResourceError;
use super::signal::StopSignal;
use std::any::type_name;
use std::fmt;
use std::time::Duration;

pub use super::receiver::ChannelInput;
pub use super::sender::{ChannelMessage, ChannelOutput, port_channel};

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    /// Provides port: data flows into the component
    Input,
    /// Uses port: data flows out of the component
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("Provides"),
            PortDirection::Output => f.write_str("Uses"),
        }
    }
}

/// Schema describing a port's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSchema {
    pub name: String,
    /// Rust type carried by the port, standing in for a repository id
    pub type_name: &'static str,
    pub index: usize,
    pub direction: PortDirection,
}

impl PortSchema {
    /// Create a new port schema with type information
    pub fn new<T: 'static>(name: impl Into<String>, index: usize, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            type_name: type_name::<T>(),
            index,
            direction,
        }
    }
}

/// Outcome of asking an input source for the next unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake<T> {
    Unit(T),
    /// Nothing arrived within the timeout
    Idle,
    /// The source will never produce again
    EndOfStream,
}

/// Source of input units for the worker loop
pub trait InputSource: Send + 'static {
    type Item: Send + 'static;

    /// Wait at most `timeout` for the next unit.
    ///
    /// Must not block longer than `timeout`, and should return `Idle` as soon
    /// as `stop` fires. Sources backed by a crossbeam channel select on
    /// [`StopSignal::wake_receiver`].
    fn next(&mut self, timeout: Duration, stop: &StopSignal) -> Result<Intake<Self::Item>, ResourceError>;
}

/// A unit the sink refused, handed back for retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected<T> {
    pub unit: T,
    pub error: ResourceError,
}

/// Destination for output units
pub trait OutputSink: Send + 'static {
    type Item: Send + 'static;

    /// Emit one unit. Must return within a bounded time.
    fn emit(&mut self, unit: Self::Item) -> Result<(), Rejected<Self::Item>>;
}
