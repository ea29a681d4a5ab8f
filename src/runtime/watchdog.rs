//! Data-path watchdog for detecting stalled operations
//!
//! Low-overhead monitoring using atomic timestamps instead of locks.
//! The worker stamps the start of each processing call and each emission,
//! and a monitor thread periodically scans the stamps to report anything
//! blocked longer than the threshold.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use super::signal::StopSignal;

/// Default blocking threshold before a warning is logged
pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(5);

/// Timestamp in milliseconds since UNIX_EPOCH
#[inline(always)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Shared state for a single watched operation
struct OperationState {
    /// Timestamp (ms since epoch) when current operation started, or 0 if idle
    last_op_start: AtomicU64,
    /// Track if we've already warned about this operation being blocked
    has_warned: AtomicBool,
    component: String,
    target: String,
    operation: String,
}

/// Handle to an operation's watchdog state (held by the worker loop)
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<OperationState>,
}

impl WatchdogHandle {
    /// Mark the start of a potentially blocking operation
    #[inline(always)]
    pub fn start_operation(&self) {
        self.state.last_op_start.store(now_millis(), Ordering::Relaxed);
        self.state.has_warned.store(false, Ordering::Relaxed);
    }

    /// Mark the end of the operation (clears timestamp to 0)
    #[inline(always)]
    pub fn finish_operation(&self) {
        if self.state.has_warned.swap(false, Ordering::Relaxed) {
            info!(
                "UNBLOCKED: [{}] {} on '{}'",
                self.state.component, self.state.operation, self.state.target
            );
        }
        self.state.last_op_start.store(0, Ordering::Relaxed);
    }
}

/// Shared watchdog state
#[derive(Clone)]
pub struct Watchdog {
    operations: Arc<Mutex<Vec<Weak<OperationState>>>>,
    threshold_ms: Arc<AtomicU64>,
}

impl Watchdog {
    /// Create a new watchdog
    pub fn new(threshold: Duration) -> Self {
        Self {
            operations: Arc::new(Mutex::new(Vec::new())),
            threshold_ms: Arc::new(AtomicU64::new(threshold.as_millis() as u64)),
        }
    }

    pub fn set_threshold(&self, threshold: Duration) {
        self.threshold_ms
            .store(threshold.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms.load(Ordering::Relaxed))
    }

    /// Register an operation for monitoring
    pub fn register(&self, component: &str, operation: &str, target: &str) -> WatchdogHandle {
        let state = Arc::new(OperationState {
            last_op_start: AtomicU64::new(0),
            has_warned: AtomicBool::new(false),
            component: component.to_string(),
            target: target.to_string(),
            operation: operation.to_string(),
        });

        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::downgrade(&state));

        WatchdogHandle { state }
    }

    /// Check for blocked operations, returning how many were newly reported
    pub fn check_for_blocked(&self) -> usize {
        let now = now_millis();
        let threshold_ms = self.threshold_ms.load(Ordering::Relaxed);
        let mut reported = 0;

        let mut operations = self
            .operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Remove dead weak references and check live ones
        operations.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let start = state.last_op_start.load(Ordering::Relaxed);
            if start > 0 {
                let duration_ms = now.saturating_sub(start);
                if duration_ms > threshold_ms && !state.has_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "BLOCKED: [{}] {} on '{}' for {:.1}s",
                        state.component,
                        state.operation,
                        state.target,
                        duration_ms as f64 / 1000.0
                    );
                    reported += 1;
                }
            }
            true
        });

        reported
    }

    /// Start the monitoring thread; it exits as soon as `signal` fires
    pub fn spawn_monitor(
        &self,
        name: String,
        signal: StopSignal,
        interval: Duration,
    ) -> std::io::Result<JoinHandle<()>> {
        let watchdog = self.clone();
        std::thread::Builder::new().name(name).spawn(move || {
            while !signal.wait(interval) {
                watchdog.check_for_blocked();
            }
        })
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// RAII guard for tracking an operation - just two atomic stores
pub struct OperationGuard<'a> {
    handle: &'a WatchdogHandle,
}

impl<'a> OperationGuard<'a> {
    #[inline(always)]
    pub fn new(handle: &'a WatchdogHandle) -> Self {
        handle.start_operation();
        Self { handle }
    }
}

impl Drop for OperationGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.handle.finish_operation();
    }
}
