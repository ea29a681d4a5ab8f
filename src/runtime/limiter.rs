//! Message-limit accounting
//!
//! [`RateLimiter`] counts transmissions inside the current accounting window.
//! A window either spans a whole run (reset on every `start()`) or a fixed
//! duration. [`Backlog`] holds units suppressed under [`OverflowPolicy::Defer`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// What happens to an output unit once the window's budget is spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the unit and count it as suppressed
    #[default]
    Drop,
    /// Queue the unit and transmit it when the window reopens
    Defer,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(OverflowPolicy::Drop),
            "defer" => Ok(OverflowPolicy::Defer),
            other => Err(format!("unknown overflow policy '{}'", other)),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OverflowPolicy::Drop => f.write_str("drop"),
            OverflowPolicy::Defer => f.write_str("defer"),
        }
    }
}

/// Per-window transmit counter
#[derive(Debug)]
pub struct RateLimiter {
    window: Option<Duration>,
    window_start: Instant,
    sent: u64,
}

impl RateLimiter {
    /// `window = None` keeps a single window for the limiter's lifetime.
    /// A zero-length window is treated the same way.
    pub fn new(window: Option<Duration>, now: Instant) -> Self {
        Self {
            window: window.filter(|w| !w.is_zero()),
            window_start: now,
            sent: 0,
        }
    }

    /// Claim one transmission slot. `limit == 0` never suppresses.
    pub fn try_acquire(&mut self, limit: u64, now: Instant) -> bool {
        self.roll(now);
        if limit != 0 && self.sent >= limit {
            return false;
        }
        self.sent += 1;
        true
    }

    /// Transmissions counted in the current window
    pub fn sent_in_window(&self) -> u64 {
        self.sent
    }

    fn roll(&mut self, now: Instant) {
        if let Some(window) = self.window
            && now.saturating_duration_since(self.window_start) >= window
        {
            self.window_start = now;
            self.sent = 0;
        }
    }
}

/// Bounded FIFO of deferred output units
#[derive(Debug)]
pub struct Backlog<T> {
    queue: VecDeque<T>,
    capacity: usize,
}

impl<T> Backlog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Queue a unit at the back; hands it back when the backlog is full
    pub fn push(&mut self, unit: T) -> Result<(), T> {
        if self.queue.len() >= self.capacity {
            return Err(unit);
        }
        self.queue.push_back(unit);
        Ok(())
    }

    /// Return a unit to the front after a failed emission.
    ///
    /// The restored unit is older than anything queued, so a full backlog
    /// evicts its newest unit and hands that back instead.
    pub fn restore(&mut self, unit: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(unit);
        }
        let evicted = if self.queue.len() >= self.capacity {
            self.queue.pop_back()
        } else {
            None
        };
        self.queue.push_front(unit);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }
}
