//! Broadcast output port over crossbeam channels

use crossbeam_channel::{SendTimeoutError, Sender as CrossbeamSender, bounded};
use std::time::Duration;

use super::errors::ResourceError;
use super::ports::{OutputSink, Rejected};
use super::receiver::ChannelInput;

/// Default time an emission may wait on a full downstream queue
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Channel message wrapper for end-of-stream signaling
///
/// Wraps data flowing through channels so producers can explicitly signal
/// that no more packets will follow, even while other clones of the sender
/// are still alive. Consumers never see this enum directly: `ChannelOutput`
/// wraps values in `Packet(T)` and `ChannelInput` unwraps them.
#[derive(Clone, Debug)]
pub enum ChannelMessage<T> {
    /// A data packet
    Packet(T),
    /// End-of-stream marker
    EndOfStream,
}

/// Broadcast sender that sends to one or more consumers
///
/// Each emission waits at most `send_timeout` per destination, so a stalled
/// consumer shows up as a rejected unit instead of a hung worker. A unit
/// counts as delivered when at least one destination accepted it.
pub struct ChannelOutput<T> {
    destinations: Vec<CrossbeamSender<ChannelMessage<T>>>,
    send_timeout: Duration,
}

/// Create a bounded channel and return both ends as ports
pub fn port_channel<T: Clone + Send + 'static>(capacity: usize) -> (ChannelOutput<T>, ChannelInput<T>) {
    let (tx, rx) = bounded(capacity);
    (ChannelOutput::new(vec![tx]), ChannelInput::new(rx))
}

impl<T: Clone> ChannelOutput<T> {
    /// Create a new ChannelOutput from a vector of crossbeam senders
    pub fn new(destinations: Vec<CrossbeamSender<ChannelMessage<T>>>) -> Self {
        Self {
            destinations,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Add another destination to the broadcast set
    pub fn connect(&mut self, destination: CrossbeamSender<ChannelMessage<T>>) {
        self.destinations.push(destination);
    }

    /// Get the number of broadcast destinations
    pub fn num_destinations(&self) -> usize {
        self.destinations.len()
    }

    /// Send a value to all destinations
    pub fn send(&self, value: T) -> Result<(), Rejected<T>> {
        if self.destinations.is_empty() {
            return Ok(());
        }

        let mut any_success = false;
        let mut last_error = ResourceError::Disconnected;

        for dest in &self.destinations {
            match dest.send_timeout(ChannelMessage::Packet(value.clone()), self.send_timeout) {
                Ok(()) => any_success = true,
                Err(SendTimeoutError::Timeout(_)) => {
                    last_error = ResourceError::OutputRejected(format!(
                        "destination full for {:?}",
                        self.send_timeout
                    ));
                }
                Err(SendTimeoutError::Disconnected(_)) => {}
            }
        }

        // Only fail if no destination succeeded
        if any_success {
            Ok(())
        } else {
            Err(Rejected {
                unit: value,
                error: last_error,
            })
        }
    }

    /// Signal end-of-stream to all destinations
    pub fn close(&self) {
        for dest in &self.destinations {
            let _ = dest.send_timeout(ChannelMessage::EndOfStream, self.send_timeout);
        }
    }
}

impl<T: Clone> Clone for ChannelOutput<T> {
    fn clone(&self) -> Self {
        Self {
            destinations: self.destinations.clone(),
            send_timeout: self.send_timeout,
        }
    }
}

impl<T: Clone + Send + 'static> OutputSink for ChannelOutput<T> {
    type Item = T;

    fn emit(&mut self, unit: T) -> Result<(), Rejected<T>> {
        self.send(unit)
    }
}
