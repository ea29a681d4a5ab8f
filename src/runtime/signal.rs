//! Cooperative cancellation
//!
//! [`StopTrigger`] and [`StopSignal`] share an atomic flag and a crossbeam
//! channel nobody ever sends on. Triggering sets the flag and drops the
//! sender, which wakes every `wait()` immediately through the disconnect.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Control-side half: requests a stop
pub struct StopTrigger {
    flag: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

/// Worker-side half: polled every iteration and used for interruptible waits
#[derive(Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    wake: Receiver<()>,
}

/// Create a connected trigger/signal pair
pub fn stop_signal() -> (StopTrigger, StopSignal) {
    let flag = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded(0);
    (
        StopTrigger {
            flag: Arc::clone(&flag),
            wake: Some(tx),
        },
        StopSignal { flag, wake: rx },
    )
}

impl StopTrigger {
    pub fn trigger(&mut self) {
        self.flag.store(true, Ordering::Release);
        self.wake.take();
    }
}

impl Drop for StopTrigger {
    fn drop(&mut self) {
        self.trigger();
    }
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Channel that disconnects once a stop is requested.
    ///
    /// Nothing is ever sent on it, so an input source can `select!` on it next
    /// to its data channel and wake as soon as the component is stopped.
    pub fn wake_receiver(&self) -> &Receiver<()> {
        &self.wake
    }

    /// Sleep for up to `timeout`, returning early once stopped.
    /// Returns true if a stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_stopped(),
        }
    }
}
