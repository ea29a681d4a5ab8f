//! Shared state between the control path and the worker loop
//!
//! Every field is an independent atomic, so reads never observe a torn value
//! and no accessor holds a lock across more than one field. Mutators are
//! crate-private: only the worker loop moves the counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Exit status of the most recent worker run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    /// No worker is running
    #[default]
    Idle,
    Running,
    /// The processing step reported completion
    Finished,
    /// A resource error exceeded the retry ceiling
    Faulted(String),
}

/// Counters and the live message limit
#[derive(Debug, Default)]
pub struct SharedState {
    received: AtomicU64,
    transmitted: AtomicU64,
    suppressed: AtomicU64,
    processing_errors: AtomicU64,
    resource_retries: AtomicU64,
    deferred: AtomicU64,
    message_limit: AtomicU64,
    status: Mutex<WorkerStatus>,
}

/// Point-in-time copy of the counters.
///
/// Each field is read atomically; the set as a whole is not a single
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub received: u64,
    pub transmitted: u64,
    pub suppressed: u64,
    pub processing_errors: u64,
    pub resource_retries: u64,
    pub deferred: u64,
    pub message_limit: u64,
}

impl SharedState {
    pub fn new(message_limit: u64) -> Self {
        Self {
            message_limit: AtomicU64::new(message_limit),
            ..Self::default()
        }
    }

    pub fn messages_received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn messages_transmitted(&self) -> u64 {
        self.transmitted.load(Ordering::Acquire)
    }

    /// Units dropped by the rate limit (or by a full deferral backlog)
    pub fn messages_suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Acquire)
    }

    pub fn processing_errors(&self) -> u64 {
        self.processing_errors.load(Ordering::Acquire)
    }

    pub fn resource_retries(&self) -> u64 {
        self.resource_retries.load(Ordering::Acquire)
    }

    /// Current depth of the deferral backlog
    pub fn deferred(&self) -> u64 {
        self.deferred.load(Ordering::Acquire)
    }

    /// Transmit budget per accounting window, 0 = unlimited
    pub fn message_limit(&self) -> u64 {
        self.message_limit.load(Ordering::Acquire)
    }

    /// Takes effect on the worker's next iteration
    pub fn set_message_limit(&self, limit: u64) {
        self.message_limit.store(limit, Ordering::Release);
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            received: self.messages_received(),
            transmitted: self.messages_transmitted(),
            suppressed: self.messages_suppressed(),
            processing_errors: self.processing_errors(),
            resource_retries: self.resource_retries(),
            deferred: self.deferred(),
            message_limit: self.message_limit(),
        }
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_transmitted(&self) {
        self.transmitted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_resource_retry(&self) {
        self.resource_retries.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn set_deferred(&self, depth: usize) {
        self.deferred.store(depth as u64, Ordering::Release);
    }

    pub(crate) fn set_status(&self, status: WorkerStatus) {
        *self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }
}
