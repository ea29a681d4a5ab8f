//! Input port over a crossbeam channel
//!
//! [`ChannelInput`] wraps a `crossbeam_channel::Receiver<ChannelMessage<T>>`,
//! transparently unwraps `ChannelMessage` and caches end-of-stream state so
//! later calls report `EndOfStream` without touching the channel.

use crossbeam_channel::{Receiver as CrossbeamReceiver, select};
use std::time::Duration;

use super::errors::ResourceError;
use super::ports::{InputSource, Intake};
use super::sender::ChannelMessage;
use super::signal::StopSignal;

/// A single crossbeam receiver used as an input port
pub struct ChannelInput<T> {
    receiver: CrossbeamReceiver<ChannelMessage<T>>,
    eos: bool,
}

impl<T> ChannelInput<T> {
    pub fn new(receiver: CrossbeamReceiver<ChannelMessage<T>>) -> Self {
        Self {
            receiver,
            eos: false,
        }
    }

    /// Whether end-of-stream has been observed
    pub fn is_closed(&self) -> bool {
        self.eos
    }

    /// Collect every packet that is ready right now, without blocking
    pub fn drain_ready(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while !self.eos {
            match self.receiver.try_recv() {
                Ok(ChannelMessage::Packet(item)) => items.push(item),
                Ok(ChannelMessage::EndOfStream) => {
                    tracing::debug!("ChannelInput::drain_ready() - EndOfStream received");
                    self.eos = true;
                }
                Err(_) => break,
            }
        }
        items
    }
}

impl<T: Send + 'static> InputSource for ChannelInput<T> {
    type Item = T;

    fn next(&mut self, timeout: Duration, stop: &StopSignal) -> Result<Intake<T>, ResourceError> {
        // Check cached EOS state first
        if self.eos {
            return Ok(Intake::EndOfStream);
        }
        if stop.is_stopped() {
            return Ok(Intake::Idle);
        }

        select! {
            recv(self.receiver) -> message => match message {
                Ok(ChannelMessage::Packet(item)) => Ok(Intake::Unit(item)),
                Ok(ChannelMessage::EndOfStream) => {
                    self.eos = true;
                    tracing::debug!("ChannelInput::next() - EndOfStream received");
                    Ok(Intake::EndOfStream)
                }
                Err(_) => {
                    self.eos = true;
                    tracing::debug!("ChannelInput::next() - channel disconnected, treating as EndOfStream");
                    Ok(Intake::EndOfStream)
                }
            },
            // Only ever fires on disconnect, i.e. when a stop was requested
            recv(stop.wake_receiver()) -> _ => Ok(Intake::Idle),
            default(timeout) => Ok(Intake::Idle),
        }
    }
}
