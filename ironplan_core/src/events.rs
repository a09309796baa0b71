//! In-memory event bus decoupling state transitions from rule evaluation.
//!
//! State-machine transitions publish events; subscribers (the progression
//! dispatcher, audit logging) react. `publish` runs handlers inline and is
//! what tests use; `publish_async` hands the event to a dispatcher thread
//! over a channel so handler work never blocks the caller. Handler errors
//! are logged and isolated, never surfaced to the publisher.

use crate::types::LoggedSet;
use chrono::{DateTime, Utc};
use crossbeam::channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use uuid::Uuid;

/// Event types, 1:1 with state-machine transitions
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Enrolled,
    CycleStarted,
    CycleCompleted,
    WeekStarted,
    WeekCompleted,
    WorkoutStarted,
    WorkoutCompleted,
    WorkoutAbandoned,
    SetLogged,
    CycleBoundaryReached,
    Quit,
}

/// Data riding along with a state event
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub session_id: Option<Uuid>,
    pub week: Option<u32>,
    pub cycle_iteration: Option<u32>,
    pub day_index: Option<u32>,
    pub set: Option<LoggedSet>,
}

/// An ephemeral state-change message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub user_id: Uuid,
    pub program_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
}

impl StateEvent {
    pub fn new(
        event_type: EventType,
        user_id: Uuid,
        program_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            user_id,
            program_id: program_id.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }
}

/// A subscribed event handler
pub type Handler = Arc<dyn Fn(&StateEvent) -> crate::Result<()> + Send + Sync>;

type SubscriberMap = Arc<Mutex<HashMap<EventType, Vec<Handler>>>>;

/// Thread-safe in-memory pub/sub. Instantiated once per process with an
/// explicit lifecycle; no package-level singleton.
pub struct EventBus {
    subscribers: SubscriberMap,
    tx: Sender<StateEvent>,
}

impl EventBus {
    /// Create the bus and spawn its dispatcher thread. The thread exits
    /// when the bus is dropped.
    pub fn new() -> Self {
        let subscribers: SubscriberMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = unbounded::<StateEvent>();

        let worker_subscribers = Arc::clone(&subscribers);
        thread::spawn(move || {
            for event in rx {
                dispatch(&worker_subscribers, &event);
            }
            tracing::debug!("Event bus dispatcher thread exiting");
        });

        Self { subscribers, tx }
    }

    /// Register a handler for one event type
    pub fn subscribe(&self, event_type: EventType, handler: Handler) {
        let mut map = self.subscribers.lock().expect("subscriber lock poisoned");
        map.entry(event_type).or_default().push(handler);
    }

    /// Register a handler for several event types at once
    pub fn subscribe_all(&self, event_types: &[EventType], handler: Handler) {
        for event_type in event_types {
            self.subscribe(*event_type, Arc::clone(&handler));
        }
    }

    /// Dispatch inline on the calling thread. Deterministic; use in tests
    /// and anywhere the caller needs handlers done before proceeding.
    pub fn publish(&self, event: &StateEvent) {
        dispatch(&self.subscribers, event);
    }

    /// Hand the event to the dispatcher thread and return immediately.
    /// Handlers must not assume any ordering relative to the caller's
    /// subsequent work.
    pub fn publish_async(&self, event: StateEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!("Event bus channel closed, dropping event: {}", e);
        }
    }

    /// Publish a batch of events inline, in order
    pub fn publish_batch(&self, events: &[StateEvent]) {
        for event in events {
            self.publish(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(subscribers: &SubscriberMap, event: &StateEvent) {
    let handlers: Vec<Handler> = {
        let map = subscribers.lock().expect("subscriber lock poisoned");
        map.get(&event.event_type).cloned().unwrap_or_default()
    };

    tracing::debug!(
        "Dispatching {:?} ({}) to {} handler(s)",
        event.event_type,
        event.event_id,
        handlers.len()
    );

    for handler in handlers {
        // One failing handler never blocks the rest
        if let Err(e) = handler(event) {
            tracing::warn!(
                "Handler failed for {:?} ({}): {}",
                event.event_type,
                event.event_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn test_event(event_type: EventType) -> StateEvent {
        StateEvent::new(
            event_type,
            Uuid::new_v4(),
            "test_program",
            EventPayload::default(),
        )
    }

    #[test]
    fn test_subscribe_and_publish() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        let seen = Arc::clone(&count);
        bus.subscribe(
            EventType::SetLogged,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        bus.publish(&test_event(EventType::SetLogged));
        bus.publish(&test_event(EventType::SetLogged));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handlers_only_see_their_event_type() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        let seen = Arc::clone(&count);
        bus.subscribe(
            EventType::WorkoutCompleted,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        bus.publish(&test_event(EventType::SetLogged));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_error_does_not_stop_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        bus.subscribe(
            EventType::SetLogged,
            Arc::new(|_| Err(crate::Error::Handler("boom".into()))),
        );
        let seen = Arc::clone(&count);
        bus.subscribe(
            EventType::SetLogged,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        bus.publish(&test_event(EventType::SetLogged));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_async_delivers_on_worker_thread() {
        let bus = EventBus::new();
        let (done_tx, done_rx) = crossbeam::channel::bounded(1);

        bus.subscribe(
            EventType::WorkoutCompleted,
            Arc::new(move |event| {
                done_tx.send(event.event_id).ok();
                Ok(())
            }),
        );

        let event = test_event(EventType::WorkoutCompleted);
        let event_id = event.event_id;
        bus.publish_async(event);

        let received = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("async event never delivered");
        assert_eq!(received, event_id);
    }

    #[test]
    fn test_subscribe_all_covers_each_type() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        let seen = Arc::clone(&count);
        bus.subscribe_all(
            &[EventType::WeekCompleted, EventType::CycleCompleted],
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        bus.publish(&test_event(EventType::WeekCompleted));
        bus.publish(&test_event(EventType::CycleCompleted));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
