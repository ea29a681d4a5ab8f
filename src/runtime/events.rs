//! In-process event channel manager
//!
//! Named channels with any number of publishers and subscribers. Each
//! subscriber gets its own bounded queue and only sees events pushed after
//! it registered. A registrant may hold at most one publisher and one
//! subscriber per channel.
//!
//! [`Publisher`] is an [`OutputSink`] and [`Subscriber`] an [`InputSource`],
//! so a component can route its output through a channel and read it back.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::errors::{RegistrationError, ResourceError};
use super::ports::{InputSource, Intake, OutputSink, Rejected};
use super::signal::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
        }
    }
}

struct Channel<T> {
    subscribers: Vec<(String, Sender<T>)>,
}

struct Registry<T> {
    channels: HashMap<String, Channel<T>>,
    registrations: HashSet<(String, String, Role)>,
}

/// Registry of named event channels
pub struct EventChannelManager<T> {
    registry: Arc<Mutex<Registry<T>>>,
    queue_capacity: usize,
}

impl<T: Clone + Send + 'static> EventChannelManager<T> {
    /// `queue_capacity` bounds each subscriber's pending events
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                channels: HashMap::new(),
                registrations: HashSet::new(),
            })),
            queue_capacity,
        }
    }

    /// Register `registrant` as a publisher on `channel`
    pub fn publisher(&self, registrant: &str, channel: &str) -> Result<Publisher<T>, RegistrationError> {
        let mut registry = lock(&self.registry);
        register(&mut registry, registrant, channel, Role::Publisher)?;
        registry
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| Channel {
                subscribers: Vec::new(),
            });

        debug!("[{}] Registered publisher on '{}'", registrant, channel);
        Ok(Publisher {
            registry: Arc::clone(&self.registry),
            registrant: registrant.to_string(),
            channel: channel.to_string(),
        })
    }

    /// Register `registrant` as a subscriber on `channel`
    pub fn subscriber(&self, registrant: &str, channel: &str) -> Result<Subscriber<T>, RegistrationError> {
        let mut registry = lock(&self.registry);
        register(&mut registry, registrant, channel, Role::Subscriber)?;

        let (tx, rx) = bounded(self.queue_capacity);
        registry
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| Channel {
                subscribers: Vec::new(),
            })
            .subscribers
            .push((registrant.to_string(), tx));

        debug!("[{}] Registered subscriber on '{}'", registrant, channel);
        Ok(Subscriber {
            registry: Arc::clone(&self.registry),
            registrant: registrant.to_string(),
            channel: channel.to_string(),
            events: rx,
        })
    }

    /// Names of all channels with at least one registration
    pub fn channels(&self) -> Vec<String> {
        lock(&self.registry).channels.keys().cloned().collect()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        lock(&self.registry)
            .channels
            .get(channel)
            .map_or(0, |c| c.subscribers.len())
    }
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn register<T>(
    registry: &mut Registry<T>,
    registrant: &str,
    channel: &str,
    role: Role,
) -> Result<(), RegistrationError> {
    if channel.is_empty() {
        return Err(RegistrationError::Failed("channel name is empty".to_string()));
    }
    let key = (registrant.to_string(), channel.to_string(), role);
    if !registry.registrations.insert(key) {
        return Err(RegistrationError::Exists {
            registrant: registrant.to_string(),
            channel: channel.to_string(),
            role: role.as_str(),
        });
    }
    Ok(())
}

fn unregister<T>(registry: &Mutex<Registry<T>>, registrant: &str, channel: &str, role: Role) {
    let mut registry = lock(registry);
    registry
        .registrations
        .remove(&(registrant.to_string(), channel.to_string(), role));
    if role == Role::Subscriber
        && let Some(entry) = registry.channels.get_mut(channel)
    {
        entry.subscribers.retain(|(name, _)| name != registrant);
    }
    let in_use = registry
        .registrations
        .iter()
        .any(|(_, name, _)| name == channel);
    if !in_use {
        registry.channels.remove(channel);
    }
}

/// Publishing end of an event channel
pub struct Publisher<T> {
    registry: Arc<Mutex<Registry<T>>>,
    registrant: String,
    channel: String,
}

impl<T: Clone> Publisher<T> {
    /// Deliver `event` to every current subscriber.
    ///
    /// Fails only if subscribers exist and none of them had room.
    pub fn push(&self, event: T) -> Result<(), Rejected<T>> {
        let registry = lock(&self.registry);
        let Some(channel) = registry.channels.get(&self.channel) else {
            return Ok(());
        };
        if channel.subscribers.is_empty() {
            return Ok(());
        }

        let mut delivered = false;
        for (name, queue) in &channel.subscribers {
            match queue.try_send(event.clone()) {
                Ok(()) => delivered = true,
                Err(TrySendError::Full(_)) => {
                    debug!("[{}] Subscriber '{}' queue full on '{}'", self.registrant, name, self.channel);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }

        if delivered {
            Ok(())
        } else {
            Err(Rejected {
                unit: event,
                error: ResourceError::OutputRejected(format!(
                    "no subscriber on '{}' accepted the event",
                    self.channel
                )),
            })
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        unregister(&self.registry, &self.registrant, &self.channel, Role::Publisher);
    }
}

impl<T: Clone + Send + 'static> OutputSink for Publisher<T> {
    type Item = T;

    fn emit(&mut self, unit: T) -> Result<(), Rejected<T>> {
        self.push(unit)
    }
}

/// Subscribing end of an event channel
pub struct Subscriber<T> {
    registry: Arc<Mutex<Registry<T>>>,
    registrant: String,
    channel: String,
    events: Receiver<T>,
}

impl<T> Subscriber<T> {
    /// Wait up to `timeout` for the next event
    pub fn get_data(&self, timeout: Duration) -> Option<T> {
        self.events.recv_timeout(timeout).ok()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        unregister(&self.registry, &self.registrant, &self.channel, Role::Subscriber);
    }
}

impl<T: Send + 'static> InputSource for Subscriber<T> {
    type Item = T;

    fn next(&mut self, timeout: Duration, stop: &StopSignal) -> Result<Intake<T>, ResourceError> {
        if stop.is_stopped() {
            return Ok(Intake::Idle);
        }
        select! {
            recv(self.events) -> event => match event {
                Ok(event) => Ok(Intake::Unit(event)),
                // The registry holds our sender for as long as we are registered
                Err(_) => Err(ResourceError::Disconnected),
            },
            recv(stop.wake_receiver()) -> _ => Ok(Intake::Idle),
            default(timeout) => Ok(Intake::Idle),
        }
    }
}
