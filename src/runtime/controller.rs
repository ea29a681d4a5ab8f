//! Component controller: lifecycle state machine and worker ownership
//!
//! A [`Component`] owns its processing step, its ports and the worker thread
//! that drives them. While stopped the controller holds those resources
//! itself. `start()` moves them into a fresh worker loop and `stop()` takes
//! them back once the worker has exited, so processor state and any deferred
//! output carry over a stop/start cycle.
//!
//! `stop()` is a full barrier: it returns only after the worker thread has
//! been joined, so no counter moves afterwards.

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, bounded};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::counters::{CounterSnapshot, SharedState, WorkerStatus};
use super::errors::{LifecycleError, PropertyError};
use super::limiter::Backlog;
use super::ports::{InputSource, OutputSink, PortDirection, PortSchema};
use super::processor::Processor;
use super::properties::{ComponentProperties, PropertySource, PropertyValue, ids};
use super::signal::{StopTrigger, stop_signal};
use super::state::{ComponentState, Operation};
use super::watchdog::Watchdog;
use super::worker::{WorkerExit, WorkerLoop, WorkerParts};

const DEFAULT_INPUT_PORT: &str = "data_in";
const DEFAULT_OUTPUT_PORT: &str = "data_out";

type WorkerResult<P> = Option<(WorkerParts<P>, WorkerExit)>;

/// Ownership token for a running worker thread
struct WorkerHandle<P: Processor> {
    trigger: StopTrigger,
    thread: JoinHandle<WorkerResult<P>>,
    completion: Receiver<()>,
    monitor: Option<JoinHandle<()>>,
}

/// A processing component with a managed lifecycle
pub struct Component<P: Processor> {
    identifier: String,
    label: String,
    state: ComponentState,
    shared: Arc<SharedState>,
    properties: ComponentProperties,
    parts: Option<WorkerParts<P>>,
    worker: Option<WorkerHandle<P>>,
    watchdog: Watchdog,
    input_port: String,
    output_port: String,
}

impl<P: Processor> Component<P> {
    /// Create a component in the CREATED state
    pub fn new<I, O>(label: impl Into<String>, processor: P, input: I, output: O) -> Self
    where
        I: InputSource<Item = P::Input>,
        O: OutputSink<Item = P::Output>,
    {
        let properties = ComponentProperties::default();
        let label = label.into();
        let identifier = Uuid::new_v4().to_string();
        debug!("[{}] Created component {}", label, identifier);

        Self {
            identifier,
            label,
            state: ComponentState::Created,
            shared: Arc::new(SharedState::new(properties.message_limit)),
            parts: Some(WorkerParts {
                processor,
                input: Box::new(input),
                output: Box::new(output),
                backlog: Backlog::new(properties.backlog_capacity),
            }),
            worker: None,
            watchdog: Watchdog::new(properties.watchdog_threshold),
            properties,
            input_port: DEFAULT_INPUT_PORT.to_string(),
            output_port: DEFAULT_OUTPUT_PORT.to_string(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_port_names(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_port = input.into();
        self.output_port = output.into();
        self
    }

    /// Replace the initial configuration before the first start
    pub fn with_properties(mut self, properties: ComponentProperties) -> Result<Self, PropertyError> {
        let properties = properties.validate()?;
        self.shared.set_message_limit(properties.message_limit);
        self.properties = properties;
        Ok(self)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Launch the worker loop
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        let next = self.state.transition(Operation::Start)?;
        let parts = self.parts.take().ok_or(LifecycleError::ResourcesLost)?;

        let (trigger, signal) = stop_signal();
        self.watchdog.set_threshold(self.properties.watchdog_threshold);
        let worker = WorkerLoop::new(
            self.label.clone(),
            parts,
            Arc::clone(&self.shared),
            self.properties.clone(),
            signal.clone(),
            &self.watchdog,
            &self.output_port,
        );

        // The worker is handed over only once the thread exists, so a spawn
        // failure leaves the resources with the controller.
        let (handoff_tx, handoff_rx) = bounded::<WorkerLoop<P>>(1);
        let (completion_tx, completion_rx) = bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name(format!("{}-worker", self.label))
            .spawn(move || {
                let worker = handoff_rx.recv().ok()?;
                let result = worker.run();
                let _ = completion_tx.send(());
                Some(result)
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                error!("[{}] Failed to spawn worker thread: {}", self.label, e);
                self.parts = Some(worker.into_parts());
                return Err(LifecycleError::Spawn(e));
            }
        };

        self.shared.set_status(WorkerStatus::Running);
        if let Err(SendError(worker)) = handoff_tx.send(worker) {
            self.parts = Some(worker.into_parts());
            self.shared.set_status(WorkerStatus::Idle);
            let _ = thread.join();
            return Err(LifecycleError::WorkerPanicked(
                "worker thread exited before it was started".to_string(),
            ));
        }

        let interval = (self.properties.watchdog_threshold / 2).max(Duration::from_millis(10));
        let monitor = match self.watchdog.spawn_monitor(
            format!("{}-watchdog", self.label),
            signal,
            interval,
        ) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("[{}] Watchdog disabled, monitor thread failed: {}", self.label, e);
                None
            }
        };

        self.worker = Some(WorkerHandle {
            trigger,
            thread,
            completion: completion_rx,
            monitor,
        });
        self.state = next;
        info!("[{}] Started", self.label);
        Ok(())
    }

    /// Stop the worker and wait until it has fully quiesced
    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        let next = self.state.transition(Operation::Stop)?;
        let result = self.halt_worker();
        self.state = next;
        info!(
            "[{}] Stopped. Received {}, transmitted {}, suppressed {}.",
            self.label,
            self.shared.messages_received(),
            self.shared.messages_transmitted(),
            self.shared.messages_suppressed()
        );
        result
    }

    /// Stop if running, free every owned resource and enter RELEASED.
    ///
    /// Fails with `InvalidTransition` once released.
    pub fn release_object(&mut self) -> Result<(), LifecycleError> {
        let next = self.state.transition(Operation::Release)?;
        let result = self.halt_worker();

        if let Some(parts) = self.parts.take()
            && !parts.backlog.is_empty()
        {
            warn!(
                "[{}] Discarding {} deferred output units",
                self.label,
                parts.backlog.len()
            );
        }
        self.shared.set_deferred(0);
        self.state = next;
        info!("[{}] Released", self.label);
        result
    }

    /// Signal the worker, wait for it to exit and reclaim its resources
    fn halt_worker(&mut self) -> Result<(), LifecycleError> {
        let Some(mut handle) = self.worker.take() else {
            return Ok(());
        };

        handle.trigger.trigger();
        loop {
            match handle.completion.recv_timeout(self.properties.stop_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "[{}] Worker has not quiesced after {:?}, still waiting",
                        self.label, self.properties.stop_timeout
                    );
                }
            }
        }

        if let Some(monitor) = handle.monitor.take()
            && monitor.join().is_err()
        {
            warn!("[{}] Watchdog monitor panicked", self.label);
        }

        match handle.thread.join() {
            Ok(Some((parts, exit))) => {
                debug!("[{}] Worker joined ({:?})", self.label, exit);
                if exit == WorkerExit::Stopped {
                    self.shared.set_status(WorkerStatus::Idle);
                }
                self.parts = Some(parts);
                Ok(())
            }
            Ok(None) => Err(LifecycleError::ResourcesLost),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("[{}] Worker thread panicked: {}", self.label, message);
                self.shared.set_status(WorkerStatus::Faulted(message.clone()));
                Err(LifecycleError::WorkerPanicked(message))
            }
        }
    }

    /// Apply configuration from an external source.
    ///
    /// Only legal while CREATED or STOPPED; the next `start()` picks it up.
    pub fn load_properties(&mut self, source: &dyn PropertySource) -> Result<(), PropertyError> {
        self.state.transition(Operation::LoadProperties)?;
        let properties = source.load()?.validate()?;

        info!(
            "[{}] Loaded properties (msg_limit={}, window={:?}, policy={})",
            self.label, properties.message_limit, properties.limit_window, properties.overflow_policy
        );
        self.shared.set_message_limit(properties.message_limit);
        self.properties = properties;
        Ok(())
    }

    /// Read a property by id
    pub fn query(&self, id: &str) -> Result<PropertyValue, PropertyError> {
        let value = match id {
            ids::MSG_RECV => PropertyValue::Long(self.shared.messages_received()),
            ids::MSG_XMIT => PropertyValue::Long(self.shared.messages_transmitted()),
            ids::MSG_SUPPRESSED => PropertyValue::Long(self.shared.messages_suppressed()),
            ids::MSG_LIMIT => PropertyValue::Long(self.shared.message_limit()),
            _ => self
                .properties
                .get(id)
                .ok_or_else(|| PropertyError::Unknown(id.to_string()))?,
        };
        Ok(value)
    }

    /// Write a property by id.
    ///
    /// `msg_limit` takes effect immediately, even while started. Every other
    /// writable property requires CREATED or STOPPED.
    pub fn configure(&mut self, id: &str, value: PropertyValue) -> Result<(), PropertyError> {
        if ids::READ_ONLY.contains(&id) {
            return Err(PropertyError::ReadOnly(id.to_string()));
        }
        if self.properties.get(id).is_none() {
            return Err(PropertyError::Unknown(id.to_string()));
        }

        if id == ids::MSG_LIMIT {
            if self.state.is_released() {
                return Err(LifecycleError::InvalidTransition {
                    operation: Operation::Configure,
                    state: self.state,
                }
                .into());
            }
            self.properties.set(id, &value)?;
            self.shared.set_message_limit(self.properties.message_limit);
        } else {
            self.state.transition(Operation::Configure)?;
            self.properties.set(id, &value)?;
        }

        debug!("[{}] Configured {} = {}", self.label, id, value);
        Ok(())
    }

    /// Every property id with its current value
    pub fn snapshot(&self) -> Vec<(&'static str, PropertyValue)> {
        ids::ALL
            .iter()
            .filter_map(|id| self.query(id).ok().map(|value| (*id, value)))
            .collect()
    }

    pub fn properties(&self) -> &ComponentProperties {
        &self.properties
    }

    /// Shared counters, for observers on other threads
    pub fn shared_state(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.shared.snapshot()
    }

    pub fn messages_received(&self) -> u64 {
        self.shared.messages_received()
    }

    pub fn messages_transmitted(&self) -> u64 {
        self.shared.messages_transmitted()
    }

    pub fn messages_suppressed(&self) -> u64 {
        self.shared.messages_suppressed()
    }

    pub fn message_limit(&self) -> u64 {
        self.shared.message_limit()
    }

    pub fn worker_status(&self) -> WorkerStatus {
        self.shared.status()
    }

    /// Describe the component's ports
    pub fn port_set(&self) -> Vec<PortSchema> {
        vec![
            PortSchema::new::<P::Input>(self.input_port.as_str(), 0, PortDirection::Input),
            PortSchema::new::<P::Output>(self.output_port.as_str(), 0, PortDirection::Output),
        ]
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

impl<P: Processor> Drop for Component<P> {
    fn drop(&mut self) {
        if !self.state.is_released()
            && let Err(e) = self.release_object()
        {
            error!("[{}] Release on drop failed: {}", self.label, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{Passthrough, SequenceEcho};
    use crate::runtime::errors::ResourceError;
    use crate::runtime::events::EventChannelManager;
    use crate::runtime::limiter::OverflowPolicy;
    use crate::runtime::ports::{ChannelInput, ChannelOutput, Rejected, port_channel};
    use crate::runtime::processor::from_fn;
    use proptest::prelude::*;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(5);

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    fn test_properties() -> ComponentProperties {
        ComponentProperties::default().with_poll_interval(POLL)
    }

    struct Rig {
        component: Component<Passthrough<u32>>,
        feed: ChannelOutput<u32>,
        collected: ChannelInput<u32>,
    }

    fn rig(properties: ComponentProperties) -> Rig {
        let (feed, input) = port_channel::<u32>(64);
        let (output, collected) = port_channel::<u32>(64);
        let component = Component::new("ecm", Passthrough::new(), input, output)
            .with_properties(properties)
            .unwrap();
        Rig {
            component,
            feed,
            collected,
        }
    }

    impl Rig {
        fn send(&self, values: impl IntoIterator<Item = u32>) {
            for v in values {
                self.feed.send(v).unwrap();
            }
        }

        fn wait_received(&self, count: u64) {
            let shared = self.component.shared_state();
            assert!(
                wait_until(Duration::from_secs(5), || shared.messages_received() >= count),
                "received {} of {}",
                shared.messages_received(),
                count
            );
        }
    }

    #[test]
    fn test_limit_five_of_ten() {
        let mut rig = rig(test_properties().with_message_limit(5));
        rig.component.start().unwrap();
        rig.send(0..10);
        rig.wait_received(10);
        rig.component.stop().unwrap();

        assert_eq!(rig.component.messages_received(), 10);
        assert_eq!(rig.component.messages_transmitted(), 5);
        assert_eq!(rig.component.messages_suppressed(), 5);
        assert_eq!(rig.collected.drain_ready(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unlimited_when_limit_zero() {
        let mut rig = rig(test_properties());
        rig.component.start().unwrap();
        rig.send(0..20);
        rig.wait_received(20);
        let shared = rig.component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_transmitted() == 20));
        rig.component.stop().unwrap();
        assert_eq!(rig.component.messages_suppressed(), 0);
    }

    #[test]
    fn test_stop_immediately_after_start() {
        let mut rig = rig(test_properties());
        rig.component.start().unwrap();
        rig.component.stop().unwrap();

        assert_eq!(rig.component.state(), ComponentState::Stopped);
        assert_eq!(rig.component.counters(), CounterSnapshot::default());
    }

    #[test]
    fn test_release_while_started() {
        let mut rig = rig(test_properties());
        rig.component.start().unwrap();
        rig.send(0..3);
        rig.wait_received(3);

        rig.component.release_object().unwrap();
        assert_eq!(rig.component.state(), ComponentState::Released);

        let err = rig.component.start().unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(rig.component.state(), ComponentState::Released);
        assert!(rig.component.release_object().unwrap_err().is_invalid_transition());
    }

    #[test]
    fn test_invalid_transitions_leave_state() {
        let mut rig = rig(test_properties());
        assert!(rig.component.stop().unwrap_err().is_invalid_transition());
        assert_eq!(rig.component.state(), ComponentState::Created);

        rig.component.start().unwrap();
        let err = rig.component.start().unwrap_err();
        assert_eq!(err.to_string(), "cannot start while STARTED");
        assert_eq!(rig.component.state(), ComponentState::Started);

        rig.component.stop().unwrap();
        assert!(rig.component.stop().unwrap_err().is_invalid_transition());
        rig.component.start().unwrap();
        assert_eq!(rig.component.state(), ComponentState::Started);
    }

    #[test]
    fn test_counters_frozen_after_stop() {
        let mut rig = rig(test_properties());
        rig.component.start().unwrap();
        rig.send(0..5);
        rig.wait_received(5);
        rig.component.stop().unwrap();

        let before = rig.component.counters();
        rig.send(5..15);
        thread::sleep(POLL * 10);
        assert_eq!(rig.component.counters(), before);

        // The queued input is picked up by the next run
        rig.component.start().unwrap();
        rig.wait_received(15);
        rig.component.stop().unwrap();
    }

    #[test]
    fn test_defer_delivers_everything_in_order() {
        let properties = test_properties()
            .with_message_limit(5)
            .with_limit_window(Some(Duration::from_millis(50)))
            .with_overflow_policy(OverflowPolicy::Defer);
        let mut rig = rig(properties);
        rig.component.start().unwrap();
        rig.send(0..10);

        let shared = rig.component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_transmitted() == 10));
        rig.component.stop().unwrap();

        assert_eq!(rig.component.messages_suppressed(), 0);
        assert_eq!(rig.component.counters().deferred, 0);
        assert_eq!(rig.collected.drain_ready(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_backlog_survives_restart_and_drops_on_release() {
        let properties = test_properties()
            .with_message_limit(2)
            .with_overflow_policy(OverflowPolicy::Defer);
        let mut rig = rig(properties);
        rig.component.start().unwrap();
        rig.send(0..5);
        rig.wait_received(5);
        rig.component.stop().unwrap();
        assert_eq!(rig.component.counters().deferred, 3);

        // A fresh run opens a fresh window and flushes the backlog first
        rig.component.start().unwrap();
        let shared = rig.component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_transmitted() == 4));
        rig.component.stop().unwrap();
        assert_eq!(rig.collected.drain_ready(), vec![0, 1, 2, 3]);
        assert_eq!(rig.component.counters().deferred, 1);

        rig.component.release_object().unwrap();
        assert_eq!(rig.component.counters().deferred, 0);
    }

    #[test]
    fn test_processing_errors_are_contained() {
        let (feed, input) = port_channel::<u32>(64);
        let (output, mut collected) = port_channel::<u32>(64);
        let picky = from_fn("picky", |x: u32, out: &mut Vec<u32>| {
            if x == 2 {
                return Err(crate::runtime::ProcessingError::Malformed("two".to_string()));
            }
            if x == 3 {
                panic!("three");
            }
            out.push(x);
            Ok(())
        });
        let mut component = Component::new("picky", picky, input, output)
            .with_properties(test_properties())
            .unwrap();
        component.start().unwrap();
        for v in 0..6 {
            feed.send(v).unwrap();
        }

        let shared = component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_transmitted() == 4));
        component.stop().unwrap();
        assert_eq!(component.counters().processing_errors, 2);
        assert_eq!(collected.drain_ready(), vec![0, 1, 4, 5]);
    }

    struct RejectingSink;

    impl OutputSink for RejectingSink {
        type Item = u32;

        fn emit(&mut self, unit: u32) -> Result<(), Rejected<u32>> {
            Err(Rejected {
                unit,
                error: ResourceError::OutputRejected("no route".to_string()),
            })
        }
    }

    #[test]
    fn test_resource_failures_fault_worker() {
        let (feed, input) = port_channel::<u32>(64);
        let mut properties = test_properties().with_retry_limit(2);
        properties.max_backoff = Duration::from_millis(10);
        let mut component = Component::new("faulty", Passthrough::new(), input, RejectingSink)
            .with_properties(properties)
            .unwrap();
        component.start().unwrap();
        feed.send(1).unwrap();

        let shared = component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || matches!(
            shared.status(),
            WorkerStatus::Faulted(_)
        )));
        assert_eq!(component.state(), ComponentState::Started);
        component.stop().unwrap();
        assert_eq!(component.state(), ComponentState::Stopped);
        assert!(matches!(component.worker_status(), WorkerStatus::Faulted(_)));

        // A restart gets a clean retry budget
        component.start().unwrap();
        assert_eq!(component.worker_status(), WorkerStatus::Running);
        component.stop().unwrap();
        assert_eq!(component.worker_status(), WorkerStatus::Idle);
    }

    struct PanickingSink;

    impl OutputSink for PanickingSink {
        type Item = u32;

        fn emit(&mut self, _unit: u32) -> Result<(), Rejected<u32>> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn test_worker_panic_reported_by_stop() {
        let (feed, input) = port_channel::<u32>(4);
        let mut component = Component::new("panicky", Passthrough::new(), input, PanickingSink)
            .with_properties(test_properties())
            .unwrap();
        component.start().unwrap();
        feed.send(1).unwrap();

        let shared = component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_received() == 1));
        let err = component.stop().unwrap_err();
        assert!(matches!(err, LifecycleError::WorkerPanicked(ref m) if m.contains("sink exploded")));
        assert_eq!(component.state(), ComponentState::Stopped);

        assert!(matches!(component.start(), Err(LifecycleError::ResourcesLost)));
        assert_eq!(component.state(), ComponentState::Stopped);
        component.release_object().unwrap();
    }

    #[test]
    fn test_finished_processor() {
        let (feed, input) = port_channel::<u64>(64);
        let (output, _collected) = port_channel::<u64>(64);
        let mut component = Component::new("echo", SequenceEcho::new(0).with_stop_after(3), input, output)
            .with_properties(test_properties())
            .unwrap();
        component.start().unwrap();
        for v in 0..10 {
            feed.send(v).unwrap();
        }

        let shared = component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.status() == WorkerStatus::Finished));
        assert_eq!(component.state(), ComponentState::Started);
        component.stop().unwrap();
        assert_eq!(component.messages_transmitted(), 3);
        assert_eq!(component.worker_status(), WorkerStatus::Finished);
    }

    #[test]
    fn test_load_properties_gated_by_state() {
        let mut rig = rig(test_properties().with_message_limit(2));
        rig.component.start().unwrap();
        let err = rig
            .component
            .load_properties(&test_properties().with_message_limit(4))
            .unwrap_err();
        assert!(matches!(err, PropertyError::Lifecycle(_)));

        rig.send(0..5);
        rig.wait_received(5);
        rig.component.stop().unwrap();
        assert_eq!(rig.component.messages_transmitted(), 2);

        rig.component
            .load_properties(&test_properties().with_message_limit(4))
            .unwrap();
        assert_eq!(rig.component.message_limit(), 4);

        rig.component.start().unwrap();
        rig.send(5..10);
        rig.wait_received(10);
        rig.component.stop().unwrap();
        assert_eq!(rig.component.messages_transmitted(), 6);
    }

    #[test]
    fn test_invalid_properties_rejected() {
        /// Source that skips the per-property checks
        struct RawSource(ComponentProperties);

        impl PropertySource for RawSource {
            fn load(&self) -> Result<ComponentProperties, PropertyError> {
                Ok(self.0.clone())
            }
        }

        let zero_poll = ComponentProperties {
            poll_interval: Duration::ZERO,
            ..test_properties()
        };
        let mut rig = rig(test_properties().with_message_limit(3));
        let err = rig.component.load_properties(&RawSource(zero_poll.clone())).unwrap_err();
        assert!(matches!(err, PropertyError::InvalidValue { .. }));
        assert_eq!(rig.component.properties().poll_interval, POLL);
        assert_eq!(rig.component.message_limit(), 3);

        let (_feed, input) = port_channel::<u32>(4);
        let (output, _collected) = port_channel::<u32>(4);
        let built = Component::new("ecm", Passthrough::new(), input, output).with_properties(zero_poll);
        assert!(built.is_err());
    }

    #[test]
    fn test_zero_window_keeps_run_limit() {
        let properties = ComponentProperties {
            limit_window: Some(Duration::ZERO),
            ..test_properties().with_message_limit(5)
        };
        let mut rig = rig(properties);
        rig.component.start().unwrap();
        rig.send(0..10);
        rig.wait_received(10);
        rig.component.stop().unwrap();

        assert_eq!(rig.component.messages_transmitted(), 5);
        assert_eq!(rig.component.messages_suppressed(), 5);
    }

    #[test]
    fn test_stop_does_not_wait_out_poll_interval() {
        let mut rig = rig(ComponentProperties::default().with_poll_interval(Duration::from_secs(5)));
        rig.component.start().unwrap();
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        rig.component.stop().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1), "stop took {:?}", start.elapsed());
        assert_eq!(rig.component.state(), ComponentState::Stopped);
    }

    #[test]
    fn test_property_file_load() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "msg_limit = 7").unwrap();
        writeln!(file, "overflow_policy = defer").unwrap();

        let mut rig = rig(test_properties());
        rig.component
            .load_properties(&crate::runtime::PropertyFile::new(file.path()))
            .unwrap();
        assert_eq!(rig.component.query(ids::MSG_LIMIT).unwrap(), PropertyValue::Long(7));
        assert_eq!(rig.component.properties().overflow_policy, OverflowPolicy::Defer);
    }

    #[test]
    fn test_configure_rules() {
        let mut rig = rig(test_properties());
        let err = rig.component.configure(ids::MSG_XMIT, PropertyValue::Long(3)).unwrap_err();
        assert!(matches!(err, PropertyError::ReadOnly(_)));
        let err = rig.component.configure("bogus", PropertyValue::Long(3)).unwrap_err();
        assert!(matches!(err, PropertyError::Unknown(_)));

        rig.component.start().unwrap();
        // The limit is live while started
        rig.component.configure(ids::MSG_LIMIT, PropertyValue::Long(3)).unwrap();
        assert_eq!(rig.component.message_limit(), 3);
        let err = rig.component.configure(ids::RETRY_LIMIT, PropertyValue::Long(1)).unwrap_err();
        assert!(matches!(err, PropertyError::Lifecycle(_)));

        rig.send(0..6);
        rig.wait_received(6);
        rig.component.stop().unwrap();
        assert_eq!(rig.component.messages_transmitted(), 3);

        rig.component.configure(ids::RETRY_LIMIT, PropertyValue::Long(1)).unwrap();
        assert_eq!(rig.component.query(ids::RETRY_LIMIT).unwrap(), PropertyValue::Long(1));

        rig.component.release_object().unwrap();
        let err = rig.component.configure(ids::MSG_LIMIT, PropertyValue::Long(9)).unwrap_err();
        assert!(matches!(err, PropertyError::Lifecycle(_)));
    }

    #[test]
    fn test_snapshot_lists_every_property() {
        let rig = rig(test_properties().with_message_limit(5));
        let snapshot = rig.component.snapshot();
        assert_eq!(snapshot.len(), ids::ALL.len());
        assert!(snapshot.contains(&(ids::MSG_RECV, PropertyValue::Long(0))));
        assert!(snapshot.contains(&(ids::MSG_LIMIT, PropertyValue::Long(5))));
        assert!(snapshot.contains(&(ids::OVERFLOW_POLICY, "drop".into())));
    }

    #[test]
    fn test_port_set() {
        let rig = rig(test_properties());
        let ports = rig.component.port_set();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name, "data_in");
        assert_eq!(ports[0].direction, PortDirection::Input);
        assert_eq!(ports[0].type_name, "u32");
        assert_eq!(ports[1].name, "data_out");
        assert_eq!(ports[1].direction.to_string(), "Uses");
    }

    #[test]
    fn test_identity() {
        let a = rig(test_properties());
        let b = rig(test_properties());
        assert_ne!(a.component.identifier(), b.component.identifier());
        assert!(Uuid::parse_str(a.component.identifier()).is_ok());

        let named = rig(test_properties()).component.with_identifier("ECM_1");
        assert_eq!(named.identifier(), "ECM_1");
        assert_eq!(named.label(), "ecm");
    }

    #[test]
    fn test_event_channel_loopback() {
        let manager = EventChannelManager::<u64>::new(16);
        let input = manager.subscriber("ecm", "test1").unwrap();
        let output = manager.publisher("ecm", "test1").unwrap();
        let driver = manager.publisher("driver", "test1").unwrap();

        let mut component = Component::new("ecm", SequenceEcho::new(0), input, output)
            .with_properties(test_properties().with_message_limit(5))
            .unwrap();
        component.start().unwrap();
        driver.push(0).unwrap();

        let shared = component.shared_state();
        assert!(wait_until(Duration::from_secs(5), || shared.messages_suppressed() == 1));
        component.stop().unwrap();

        // Seed plus five echoes came back; the sixth echo was suppressed
        assert_eq!(component.messages_transmitted(), 5);
        assert_eq!(component.messages_received(), 6);
        assert_eq!(component.counters().processing_errors, 0);
    }

    #[test]
    fn test_drop_releases_running_component() {
        let rig = rig(test_properties());
        let shared = rig.component.shared_state();
        let Rig { mut component, .. } = rig;
        component.start().unwrap();
        drop(component);
        assert_eq!(shared.status(), WorkerStatus::Idle);
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Start,
        Stop,
        Release,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Start), Just(Op::Stop), Just(Op::Release)]
    }

    /// Legal lifecycle moves for the operations driven below
    fn legal_move(state: ComponentState, op: Op) -> Option<ComponentState> {
        use ComponentState::*;
        match (state, op) {
            (Created | Stopped, Op::Start) => Some(Started),
            (Started, Op::Stop) => Some(Stopped),
            (Created | Started | Stopped, Op::Release) => Some(Released),
            _ => None,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn lifecycle_follows_state_machine(ops in prop::collection::vec(op_strategy(), 1..8)) {
            let mut rig = rig(test_properties());
            let mut expected = ComponentState::Created;

            for op in ops {
                let result = match op {
                    Op::Start => rig.component.start(),
                    Op::Stop => rig.component.stop(),
                    Op::Release => rig.component.release_object(),
                };

                match legal_move(expected, op) {
                    Some(next) => {
                        prop_assert!(result.is_ok());
                        expected = next;
                    }
                    None => {
                        prop_assert!(result.unwrap_err().is_invalid_transition());
                    }
                }
                prop_assert_eq!(rig.component.state(), expected);
            }
        }
    }
}
