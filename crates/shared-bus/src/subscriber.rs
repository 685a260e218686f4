//! # Event Subscriber
//!
//! Subscription handles and the per-subscription delivery task.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use shared_types::panic_message;
use tokio::sync::{broadcast, watch};
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::events::{Event, EventError};

/// Lifecycle of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Events are delivered as they arrive.
    Active,
    /// Delivery is suspended; events buffer in the channel until resumed.
    Paused,
    /// Terminal. No further events are delivered.
    Cancelled,
}

pub(crate) type SyncHandler = Arc<dyn Fn(&Event) -> Result<(), EventError> + Send + Sync>;
pub(crate) type AsyncHandler =
    Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, Result<(), EventError>> + Send + Sync>;
pub(crate) type ErrorCallback = Arc<dyn Fn(&EventError, &Event) + Send + Sync>;

/// The two handler flavors a subscription may carry.
pub(crate) enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// Bookkeeping the bus keeps for every live subscription.
pub(crate) struct SubscriptionEntry {
    pub(crate) event: String,
    pub(crate) control: Arc<watch::Sender<SubscriptionState>>,
}

pub(crate) type SubscriptionTable = Mutex<HashMap<u64, SubscriptionEntry>>;

/// Handle to one `(event name, handler)` registration.
///
/// Dropping the handle does not cancel the subscription; only
/// [`Subscription::cancel`] or [`crate::EventBus::dispose`] do.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    event: String,
    control: Arc<watch::Sender<SubscriptionState>>,
    table: Weak<SubscriptionTable>,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        event: String,
        control: Arc<watch::Sender<SubscriptionState>>,
        table: Weak<SubscriptionTable>,
    ) -> Self {
        Self {
            id,
            event,
            control,
            table,
        }
    }

    /// A handle that was never attached to a live bus.
    pub(crate) fn inert(event: String) -> Self {
        let (control, _) = watch::channel(SubscriptionState::Cancelled);
        Self::new(0, event, Arc::new(control), Weak::new())
    }

    /// Bus-assigned identifier; `0` for inert handles.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The event name this subscription listens to.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        *self.control.borrow()
    }

    /// Whether delivery is suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state() == SubscriptionState::Paused
    }

    /// Whether the subscription has ended.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == SubscriptionState::Cancelled
    }

    /// Suspend delivery. No effect once cancelled.
    pub fn pause(&self) {
        self.control.send_if_modified(|state| {
            if *state == SubscriptionState::Active {
                *state = SubscriptionState::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Resume delivery, starting with any events buffered while paused.
    pub fn resume(&self) {
        self.control.send_if_modified(|state| {
            if *state == SubscriptionState::Paused {
                *state = SubscriptionState::Active;
                true
            } else {
                false
            }
        });
    }

    /// End the subscription. Idempotent.
    pub fn cancel(&self) {
        self.control.send_replace(SubscriptionState::Cancelled);
        if let Some(table) = self.table.upgrade() {
            if table.lock().remove(&self.id).is_some() {
                debug!(event = %self.event, id = self.id, "Subscription cancelled");
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("state", &self.state())
            .finish()
    }
}

/// Deliver events from `receiver` to `handler` until cancelled or closed.
pub(crate) async fn run_subscription(
    id: u64,
    mut receiver: broadcast::Receiver<Arc<Event>>,
    mut signal: watch::Receiver<SubscriptionState>,
    handler: Handler,
    on_error: Option<ErrorCallback>,
) {
    loop {
        let state = *signal.borrow_and_update();
        match state {
            SubscriptionState::Cancelled => break,
            SubscriptionState::Paused => {
                if signal.changed().await.is_err() {
                    break;
                }
                continue;
            }
            SubscriptionState::Active => {}
        }

        tokio::select! {
            biased;
            changed = signal.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            received = receiver.recv() => match received {
                Ok(event) => dispatch(&handler, on_error.as_ref(), event).await,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(id, lagged = count, "Subscriber lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!(id, "Subscription task finished");
}

async fn dispatch(handler: &Handler, on_error: Option<&ErrorCallback>, event: Arc<Event>) {
    let outcome = match handler {
        Handler::Sync(f) => {
            let f = Arc::clone(f);
            let event = Arc::clone(&event);
            std::panic::catch_unwind(AssertUnwindSafe(move || f(&*event)))
                .unwrap_or_else(|panic| Err(EventError::Panicked(panic_message(panic.as_ref()))))
        }
        Handler::Async(f) => {
            let f = Arc::clone(f);
            let event = Arc::clone(&event);
            AssertUnwindSafe(async move { f(event).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(EventError::Panicked(panic_message(panic.as_ref()))))
        }
    };

    let Err(error) = outcome else {
        return;
    };

    match on_error {
        Some(callback) => {
            let callback = Arc::clone(callback);
            let reported = std::panic::catch_unwind(AssertUnwindSafe(|| callback(&error, &*event)));
            if reported.is_err() {
                warn!(event = %event.name, error = %error, "Error callback panicked");
            }
        }
        None => warn!(event = %event.name, error = %error, "Event handler failed"),
    }
}

/// A stream of events for one name.
///
/// Implements `tokio_stream::Stream`. Lagged events are skipped; the stream
/// ends when the bus is disposed.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = Arc<Event>> + Send>>,
    event: String,
}

impl EventStream {
    pub(crate) fn new(event: String, inner: Pin<Box<dyn Stream<Item = Arc<Event>> + Send>>) -> Self {
        Self { inner, event }
    }

    /// The event name this stream listens to.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event
    }
}

impl Stream for EventStream {
    type Item = Arc<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
