//! # Event Publisher
//!
//! The bus itself: lazily-created per-name channels, subscription
//! bookkeeping, and teardown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::Metadata;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::events::{Event, EventError};
use crate::subscriber::{
    run_subscription, ErrorCallback, EventStream, Handler, Subscription, SubscriptionEntry,
    SubscriptionState, SubscriptionTable,
};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Named publish/subscribe bus.
///
/// Uses one `tokio::sync::broadcast` channel per event name. Each
/// subscription runs its handler on its own task, so a slow or failing
/// subscriber never delays its siblings or the publisher.
pub struct EventBus {
    /// Broadcast sender per event name, created on first use.
    channels: RwLock<HashMap<String, broadcast::Sender<Arc<Event>>>>,

    /// Live subscriptions, shared weakly with their handles.
    subscriptions: Arc<SubscriptionTable>,

    /// Next subscription id.
    next_id: AtomicU64,

    /// Total events fired.
    events_fired: AtomicU64,

    /// Set once by `dispose`.
    disposed: AtomicBool,

    /// Per-channel capacity.
    capacity: usize,
}

impl EventBus {
    /// Create a bus with default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose channels buffer up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            events_fired: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe a synchronous handler to `name`.
    ///
    /// Handler failures are logged.
    pub fn on<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), EventError> + Send + Sync + 'static,
    {
        self.subscribe(name, Handler::Sync(Arc::new(handler)), None)
    }

    /// Subscribe a synchronous handler with its own error callback.
    pub fn on_with_error<F, E>(&self, name: &str, handler: F, on_error: E) -> Subscription
    where
        F: Fn(&Event) -> Result<(), EventError> + Send + Sync + 'static,
        E: Fn(&EventError, &Event) + Send + Sync + 'static,
    {
        self.subscribe(name, Handler::Sync(Arc::new(handler)), Some(Arc::new(on_error)))
    }

    /// Subscribe an asynchronous handler to `name`.
    pub fn on_async<F, Fut>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        self.subscribe(name, Self::boxed_async(handler), None)
    }

    /// Subscribe an asynchronous handler with its own error callback.
    pub fn on_async_with_error<F, Fut, E>(&self, name: &str, handler: F, on_error: E) -> Subscription
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
        E: Fn(&EventError, &Event) + Send + Sync + 'static,
    {
        self.subscribe(name, Self::boxed_async(handler), Some(Arc::new(on_error)))
    }

    fn boxed_async<F, Fut>(handler: F) -> Handler
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        Handler::Async(Arc::new(move |event| handler(event).boxed()))
    }

    fn subscribe(&self, name: &str, handler: Handler, on_error: Option<ErrorCallback>) -> Subscription {
        if self.is_disposed() {
            debug!(event = name, "Subscribe after dispose ignored");
            return Subscription::inert(name.to_string());
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(event = name, "Subscribe called outside a Tokio runtime, ignoring");
            return Subscription::inert(name.to_string());
        };

        // Receiver is created before returning, so nothing fired after this
        // call can be missed.
        let receiver = self.sender(name).subscribe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (control, signal) = watch::channel(SubscriptionState::Active);
        let control = Arc::new(control);

        self.subscriptions.lock().insert(
            id,
            SubscriptionEntry {
                event: name.to_string(),
                control: Arc::clone(&control),
            },
        );
        runtime.spawn(run_subscription(id, receiver, signal, handler, on_error));

        debug!(event = name, id, "New subscription created");
        Subscription::new(id, name.to_string(), control, Arc::downgrade(&self.subscriptions))
    }

    /// Fire an event without waiting for any subscriber.
    ///
    /// Returns the number of channel receivers the event was handed to. With
    /// zero subscribers the event is dropped; it is never replayed.
    pub fn fire(&self, name: &str, data: Value, metadata: Metadata) -> usize {
        if self.is_disposed() {
            debug!(event = name, "Fire after dispose ignored");
            return 0;
        }

        let event = Arc::new(Event::new(name, data, metadata));
        self.events_fired.fetch_add(1, Ordering::Relaxed);

        match self.sender(name).send(event) {
            Ok(receivers) => {
                debug!(event = name, receivers, "Event fired");
                receivers
            }
            Err(_) => {
                debug!(event = name, "Event dropped (no subscribers)");
                0
            }
        }
    }

    /// Fire an event and yield once so cooperatively-scheduled handlers can run.
    ///
    /// This is a courtesy, not a completion guarantee.
    pub async fn fire_and_wait(&self, name: &str, data: Value, metadata: Metadata) -> usize {
        let receivers = self.fire(name, data, metadata);
        tokio::task::yield_now().await;
        receivers
    }

    /// A stream of every event fired on `name` from now on.
    #[must_use]
    pub fn stream(&self, name: &str) -> EventStream {
        if self.is_disposed() {
            debug!(event = name, "Stream after dispose is empty");
            return EventStream::new(name.to_string(), Box::pin(tokio_stream::empty()));
        }
        let receiver = self.sender(name).subscribe();
        let inner = BroadcastStream::new(receiver).filter_map(Result::ok);
        EventStream::new(name.to_string(), Box::pin(inner))
    }

    /// Number of live subscriptions for `name`.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscriptions
            .lock()
            .values()
            .filter(|entry| entry.event == name)
            .count()
    }

    /// Number of live subscriptions across all names.
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Total events fired, including those with no subscribers.
    #[must_use]
    pub fn events_fired(&self) -> u64 {
        self.events_fired.load(Ordering::Relaxed)
    }

    /// Names that have a channel.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Per-channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `dispose` has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cancel every subscription and close every channel.
    ///
    /// Idempotent. Afterwards `on*` return inert handles and `fire` is a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let cancelled: Vec<SubscriptionEntry> = self
            .subscriptions
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for entry in &cancelled {
            entry.control.send_replace(SubscriptionState::Cancelled);
        }
        let channels = {
            let mut channels = self.channels.write();
            let count = channels.len();
            channels.clear();
            count
        };
        info!(
            subscriptions = cancelled.len(),
            channels, "Event bus disposed"
        );
    }

    fn sender(&self, name: &str) -> broadcast::Sender<Arc<Event>> {
        if let Some(sender) = self.channels.read().get(name) {
            return sender.clone();
        }
        self.channels
            .write()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels.read().len())
            .field("subscriptions", &self.total_subscriptions())
            .field("events_fired", &self.events_fired())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
