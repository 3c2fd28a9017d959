//! Event system for battery level notifications
//!
//! The broker distributes engine events to any number of subscribers, each
//! with its own filter. The persistence adapter subscribes to state-changed
//! notifications; host integrations typically subscribe to the threshold
//! events only.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::Stream;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::battery::thresholds::ThresholdCrossing;

/// Type of battery event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Level dropped below the low threshold
    LevelLow,
    /// Level dropped below the critical threshold
    LevelCritical,
    /// Level reached the full threshold
    LevelFull,
    /// Observable state changed (any mutation)
    StateChanged,
}

/// An event emitted by a battery engine
#[derive(Debug, Clone, PartialEq)]
pub enum BatteryEvent {
    /// Level dropped below 20%
    LevelLow { entity_id: String, battery_level: f64 },
    /// Level dropped below 10%
    LevelCritical { entity_id: String, battery_level: f64 },
    /// Level reached 95% or above
    LevelFull { entity_id: String, battery_level: f64 },
    /// Observable state changed; consumed by the persistence adapter
    StateChanged { entity_id: String, battery_level: f64 },
}

impl BatteryEvent {
    /// Build the threshold event for a crossing
    pub fn from_crossing(crossing: ThresholdCrossing, entity_id: &str, battery_level: f64) -> Self {
        let entity_id = entity_id.to_string();
        match crossing {
            ThresholdCrossing::Low => Self::LevelLow { entity_id, battery_level },
            ThresholdCrossing::Critical => Self::LevelCritical { entity_id, battery_level },
            ThresholdCrossing::Full => Self::LevelFull { entity_id, battery_level },
        }
    }

    /// Get the type of this event
    pub fn get_type(&self) -> EventType {
        match self {
            Self::LevelLow { .. } => EventType::LevelLow,
            Self::LevelCritical { .. } => EventType::LevelCritical,
            Self::LevelFull { .. } => EventType::LevelFull,
            Self::StateChanged { .. } => EventType::StateChanged,
        }
    }

    /// Wire name of the event, as published on the host event bus
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::LevelLow { .. } => "virtual_battery_low",
            Self::LevelCritical { .. } => "virtual_battery_critical",
            Self::LevelFull { .. } => "virtual_battery_full",
            Self::StateChanged { .. } => "virtual_battery_state_changed",
        }
    }

    /// The entity id this event concerns
    pub fn entity_id(&self) -> &str {
        match self {
            Self::LevelLow { entity_id, .. }
            | Self::LevelCritical { entity_id, .. }
            | Self::LevelFull { entity_id, .. }
            | Self::StateChanged { entity_id, .. } => entity_id,
        }
    }

    /// The level carried in the event payload
    pub fn battery_level(&self) -> f64 {
        match self {
            Self::LevelLow { battery_level, .. }
            | Self::LevelCritical { battery_level, .. }
            | Self::LevelFull { battery_level, .. }
            | Self::StateChanged { battery_level, .. } => *battery_level,
        }
    }
}

/// Defines which events a subscriber is interested in
pub enum EventFilter {
    /// Accept all events
    All,
    /// Only specific event types
    EventTypes(Vec<EventType>),
    /// Only events for specific entities
    Entities(Vec<String>),
    /// Custom filter function
    Custom(Box<dyn Fn(&BatteryEvent) -> bool + Send + Sync + 'static>),
}

impl Clone for EventFilter {
    fn clone(&self) -> Self {
        match self {
            Self::All => Self::All,
            Self::EventTypes(types) => Self::EventTypes(types.clone()),
            Self::Entities(ids) => Self::Entities(ids.clone()),
            Self::Custom(_) => Self::All, // Closures cannot be cloned; fall back to All
        }
    }
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "EventFilter::All"),
            Self::EventTypes(types) => write!(f, "EventFilter::EventTypes({:?})", types),
            Self::Entities(ids) => write!(f, "EventFilter::Entities({:?})", ids),
            Self::Custom(_) => write!(f, "EventFilter::Custom(<function>)"),
        }
    }
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self::All
    }

    /// Create a filter for specific event types
    pub fn event_types(types: Vec<EventType>) -> Self {
        Self::EventTypes(types)
    }

    /// Create a filter for specific entities
    pub fn entities(ids: Vec<String>) -> Self {
        Self::Entities(ids)
    }

    /// Create a custom filter with a closure
    pub fn custom<F>(filter_fn: F) -> Self
    where
        F: Fn(&BatteryEvent) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Box::new(filter_fn))
    }

    /// Create a filter that only accepts threshold crossing events
    pub fn thresholds_only() -> Self {
        Self::event_types(vec![
            EventType::LevelLow,
            EventType::LevelCritical,
            EventType::LevelFull,
        ])
    }

    /// Create a filter for the persistence adapter
    pub fn state_changes_only() -> Self {
        Self::event_types(vec![EventType::StateChanged])
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &BatteryEvent) -> bool {
        match self {
            Self::All => true,
            Self::EventTypes(types) => types.contains(&event.get_type()),
            Self::Entities(ids) => ids.iter().any(|id| id == event.entity_id()),
            Self::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Subscriber ID type
pub type SubscriberId = u32;

/// A subscriber to battery events
#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    sender: Sender<BatteryEvent>,
    filter: EventFilter,
    last_active: Instant,
}

/// The event broker manages subscribers and distributes engine events
pub struct EventBroker {
    /// Next subscriber ID to use
    next_subscriber_id: SubscriberId,
    /// Active subscribers
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    /// Handle for the distribution task
    distribution_task: Option<JoinHandle<()>>,
    /// Sender handed out to engines
    event_sender: Sender<BatteryEvent>,
    /// Receiver taken by the distribution task
    event_receiver: Arc<Mutex<Option<Receiver<BatteryEvent>>>>,
}

impl EventBroker {
    /// Create a new event broker
    pub fn new() -> Self {
        let (tx, rx) = channel(100);
        Self {
            next_subscriber_id: 1,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            distribution_task: None,
            event_sender: tx,
            event_receiver: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Get the sender engines emit through
    pub fn get_sender(&self) -> Sender<BatteryEvent> {
        self.event_sender.clone()
    }

    /// Start the event distribution task
    pub fn start(&mut self) {
        let mut rx = self.take_receiver();
        let subscribers = Arc::clone(&self.subscribers);

        self.distribution_task = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut subscribers = subscribers.lock().unwrap();
                let now = Instant::now();

                for subscriber in subscribers.iter_mut() {
                    subscriber.last_active = now;

                    if subscriber.filter.matches(&event) {
                        // Ignore errors from closed subscriber channels
                        let _ = subscriber.sender.try_send(event.clone());
                    }
                }
            }
        }));
    }

    /// Subscribe to events with a filter
    pub fn subscribe(&mut self, filter: EventFilter) -> (SubscriberId, Receiver<BatteryEvent>) {
        let (tx, rx) = channel(100);
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;

        self.subscribers.lock().unwrap().push(Subscriber {
            id,
            sender: tx,
            filter,
            last_active: Instant::now(),
        });

        (id, rx)
    }

    /// Unsubscribe from events
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.lock().unwrap().retain(|s| s.id != id);
    }

    /// Modify a subscriber's filter
    pub fn modify_filter(&mut self, id: SubscriberId, filter: EventFilter) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(subscriber) = subscribers.iter_mut().find(|s| s.id == id) {
            subscriber.filter = filter;
            true
        } else {
            false
        }
    }

    /// Shut down the broker, dropping all subscriber channels
    pub fn shutdown(&mut self) {
        if let Some(task) = self.distribution_task.take() {
            task.abort();
        }

        self.subscribers.lock().unwrap().clear();

        // Replace the channel so the old sender side gets dropped
        let (tx, rx) = channel(1);
        self.event_sender = tx;
        *self.event_receiver.lock().unwrap() = Some(rx);
    }

    /// Take ownership of the receiver
    fn take_receiver(&self) -> Receiver<BatteryEvent> {
        self.event_receiver
            .lock()
            .unwrap()
            .take()
            .expect("Receiver already taken")
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventBroker {
    fn drop(&mut self) {
        if let Some(task) = self.distribution_task.take() {
            task.abort();
        }
    }
}

/// A helper to create a Stream from an event receiver
pub fn receiver_to_stream(mut rx: Receiver<BatteryEvent>) -> impl Stream<Item = BatteryEvent> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    }
}
