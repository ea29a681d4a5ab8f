//! Worker loop: the background processing cycle of a started component
//!
//! Each iteration:
//!
//! 1. Flushes deferred output while the accounting window has budget.
//! 2. Waits at most `poll_interval` for one input unit and counts it.
//! 3. Runs the processor. Errors and panics are logged and counted, never fatal.
//! 4. Transmits each output unit the limiter admits; the rest are dropped or
//!    deferred according to the overflow policy.
//!
//! Resource failures on either port are retried with exponential back-off
//! capped at `max_backoff`. Every wait is interruptible by the stop signal.
//! After `retry_limit` consecutive failures the loop exits as faulted. Any
//! healthy intake, including an idle poll, resets the count.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use super::counters::{SharedState, WorkerStatus};
use super::errors::{ProcessingError, ResourceError};
use super::limiter::{Backlog, OverflowPolicy, RateLimiter};
use super::ports::{InputSource, Intake, OutputSink, Rejected};
use super::processor::Processor;
use super::properties::ComponentProperties;
use super::signal::StopSignal;
use super::watchdog::{OperationGuard, Watchdog, WatchdogHandle};

/// Everything the worker owns while running, returned to the controller on exit
pub(crate) struct WorkerParts<P: Processor> {
    pub(crate) processor: P,
    pub(crate) input: Box<dyn InputSource<Item = P::Input>>,
    pub(crate) output: Box<dyn OutputSink<Item = P::Output>>,
    pub(crate) backlog: Backlog<P::Output>,
}

/// Why the worker loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Stopped,
    Finished,
    Faulted(ResourceError),
}

/// What the loop does after an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Iteration {
    /// Go straight to the next iteration
    Normal,
    /// Nothing to do; back off for `poll_interval`
    Noop,
    /// The processor is done
    Finish,
}

pub(crate) struct WorkerLoop<P: Processor> {
    label: String,
    parts: WorkerParts<P>,
    shared: Arc<SharedState>,
    config: ComponentProperties,
    signal: StopSignal,
    limiter: RateLimiter,
    process_watch: WatchdogHandle,
    emit_watch: WatchdogHandle,
    scratch: Vec<P::Output>,
    end_of_stream: bool,
    consecutive_failures: u32,
}

impl<P: Processor> WorkerLoop<P> {
    pub(crate) fn new(
        label: String,
        mut parts: WorkerParts<P>,
        shared: Arc<SharedState>,
        config: ComponentProperties,
        signal: StopSignal,
        watchdog: &Watchdog,
        output_port: &str,
    ) -> Self {
        parts.backlog.set_capacity(config.backlog_capacity);
        let process_watch = watchdog.register(&label, "process", parts.processor.name());
        let emit_watch = watchdog.register(&label, "emit", output_port);
        let limiter = RateLimiter::new(config.limit_window, Instant::now());

        Self {
            label,
            parts,
            shared,
            config,
            signal,
            limiter,
            process_watch,
            emit_watch,
            scratch: Vec::new(),
            end_of_stream: false,
            consecutive_failures: 0,
        }
    }

    /// Give back the owned resources without running
    pub(crate) fn into_parts(self) -> WorkerParts<P> {
        self.parts
    }

    /// Run until stopped, finished or faulted
    pub(crate) fn run(mut self) -> (WorkerParts<P>, WorkerExit) {
        info!(
            "[{}] Worker loop running (limit={}, window={:?}, policy={})",
            self.label,
            self.shared.message_limit(),
            self.config.limit_window,
            self.config.overflow_policy
        );

        let exit = loop {
            if self.signal.is_stopped() {
                break WorkerExit::Stopped;
            }

            match self.iterate() {
                Ok(Iteration::Normal) => {}
                Ok(Iteration::Noop) => {
                    if self.signal.wait(self.config.poll_interval) {
                        break WorkerExit::Stopped;
                    }
                }
                Ok(Iteration::Finish) => break WorkerExit::Finished,
                Err(e) => break WorkerExit::Faulted(e),
            }
        };

        match &exit {
            WorkerExit::Stopped => {}
            WorkerExit::Finished => {
                info!("[{}] Processor '{}' finished", self.label, self.parts.processor.name());
                self.shared.set_status(WorkerStatus::Finished);
            }
            WorkerExit::Faulted(e) => {
                error!(
                    "[{}] Worker faulted after {} consecutive failures: {}",
                    self.label, self.consecutive_failures, e
                );
                self.shared.set_status(WorkerStatus::Faulted(e.to_string()));
            }
        }

        self.shared.set_deferred(self.parts.backlog.len());
        info!(
            "[{}] Worker exit ({:?}). Received {}, transmitted {}, suppressed {}.",
            self.label,
            exit,
            self.shared.messages_received(),
            self.shared.messages_transmitted(),
            self.shared.messages_suppressed()
        );

        (self.parts, exit)
    }

    fn iterate(&mut self) -> Result<Iteration, ResourceError> {
        if self.parts.processor.is_finished() {
            return Ok(Iteration::Finish);
        }

        self.flush_backlog()?;

        if self.end_of_stream {
            return Ok(Iteration::Noop);
        }

        let unit = match self.parts.input.next(self.config.poll_interval, &self.signal) {
            Ok(Intake::Unit(unit)) => unit,
            // The source already waited for up to poll_interval
            Ok(Intake::Idle) => {
                self.consecutive_failures = 0;
                return Ok(Iteration::Normal);
            }
            Ok(Intake::EndOfStream) => {
                info!("[{}] Input reached end of stream", self.label);
                self.consecutive_failures = 0;
                self.end_of_stream = true;
                return Ok(Iteration::Noop);
            }
            Err(e) => {
                self.back_off(e)?;
                return Ok(Iteration::Normal);
            }
        };

        self.consecutive_failures = 0;
        self.shared.record_received();
        trace!("[{}] Received unit #{}", self.label, self.shared.messages_received());

        let mut outputs = std::mem::take(&mut self.scratch);
        if let Err(e) = self.process(unit, &mut outputs) {
            self.shared.record_processing_error();
            warn!("[{}] Processing error, skipping unit: {}", self.label, e);
            outputs.clear();
        }

        let mut result = Ok(());
        for unit in outputs.drain(..) {
            if result.is_err() {
                self.suppress(unit);
                continue;
            }
            // Deferred units keep their place ahead of new output
            if self.parts.backlog.is_empty() && self.admit() {
                result = self.transmit(unit);
            } else {
                self.suppress(unit);
            }
        }
        self.scratch = outputs;
        result?;

        if self.parts.processor.is_finished() {
            return Ok(Iteration::Finish);
        }
        Ok(Iteration::Normal)
    }

    fn process(&mut self, unit: P::Input, outputs: &mut Vec<P::Output>) -> Result<(), ProcessingError> {
        let processor = &mut self.parts.processor;
        let _guard = OperationGuard::new(&self.process_watch);
        panic::catch_unwind(AssertUnwindSafe(|| processor.process(unit, outputs)))
            .unwrap_or_else(|payload| Err(ProcessingError::Failed(panic_message(payload))))
    }

    fn admit(&mut self) -> bool {
        self.limiter
            .try_acquire(self.shared.message_limit(), Instant::now())
    }

    fn flush_backlog(&mut self) -> Result<(), ResourceError> {
        while !self.parts.backlog.is_empty() && self.admit() {
            let Some(unit) = self.parts.backlog.pop() else {
                break;
            };
            self.shared.set_deferred(self.parts.backlog.len());
            self.transmit(unit)?;
        }
        Ok(())
    }

    /// Emit one admitted unit, retrying transient failures
    fn transmit(&mut self, mut unit: P::Output) -> Result<(), ResourceError> {
        loop {
            let result = {
                let _guard = OperationGuard::new(&self.emit_watch);
                self.parts.output.emit(unit)
            };

            match result {
                Ok(()) => {
                    self.consecutive_failures = 0;
                    self.shared.record_transmitted();
                    return Ok(());
                }
                Err(Rejected { unit: returned, error }) => {
                    unit = returned;
                    if let Err(e) = self.back_off(error) {
                        self.abandon(unit);
                        return Err(e);
                    }
                    if self.signal.is_stopped() {
                        debug!("[{}] Stop requested during emit retry", self.label);
                        self.abandon(unit);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle a unit the limiter did not admit
    fn suppress(&mut self, unit: P::Output) {
        match self.config.overflow_policy {
            OverflowPolicy::Drop => {
                self.shared.record_suppressed();
                debug!(
                    "[{}] Message limit {} reached, dropping output",
                    self.label,
                    self.shared.message_limit()
                );
            }
            OverflowPolicy::Defer => {
                if self.parts.backlog.push(unit).is_err() {
                    self.shared.record_suppressed();
                    warn!(
                        "[{}] Backlog full ({} units), dropping output",
                        self.label, self.config.backlog_capacity
                    );
                }
                self.shared.set_deferred(self.parts.backlog.len());
            }
        }
    }

    /// An admitted unit that could not be emitted
    fn abandon(&mut self, unit: P::Output) {
        match self.config.overflow_policy {
            OverflowPolicy::Defer => {
                if self.parts.backlog.restore(unit).is_some() {
                    self.shared.record_suppressed();
                    warn!("[{}] Backlog full, dropped newest deferred unit", self.label);
                }
                self.shared.set_deferred(self.parts.backlog.len());
            }
            OverflowPolicy::Drop => {
                self.shared.record_suppressed();
                warn!("[{}] Output unit lost after emit failure", self.label);
            }
        }
    }

    /// Count a resource failure and sleep before retrying.
    /// Fails once the retry ceiling is exceeded.
    fn back_off(&mut self, error: ResourceError) -> Result<(), ResourceError> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let limit = self.config.retry_limit;
        if limit != 0 && self.consecutive_failures > limit {
            return Err(error);
        }

        self.shared.record_resource_retry();
        let delay = backoff_delay(
            self.config.poll_interval,
            self.config.max_backoff,
            self.consecutive_failures,
        );
        debug!(
            "[{}] {} (attempt {}), retrying in {:?}",
            self.label, error, self.consecutive_failures, delay
        );
        self.signal.wait(delay);
        Ok(())
    }
}

/// `base * 2^(attempt - 1)`, capped at `max`
fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << exponent).min(max)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
