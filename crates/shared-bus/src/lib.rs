//! # Shared Bus - Named Publish/Subscribe
//!
//! Fire-and-forget broadcast between independently-authored modules.
//!
//! ## Model
//!
//! ```text
//! ┌──────────────┐   fire("user.login")   ┌──────────────────────┐
//! │  Publisher   │ ─────────────────────► │  channel "user.login" │
//! └──────────────┘     (never waits)      └──────────┬───────────┘
//!                                                    │ broadcast
//!                                  ┌─────────────────┼─────────────────┐
//!                                  ▼                 ▼                 ▼
//!                            subscriber A      subscriber B      subscriber C
//!                            (own task)        (own task)        (paused: buffers)
//! ```
//!
//! - Each event name lazily gets its own broadcast channel on first use.
//! - No replay: a subscriber only sees events fired after it subscribed.
//! - A handler failure (error or panic) goes to that subscriber's own error
//!   callback, or is logged. Siblings and the publisher never see it.
//! - [`EventBus::dispose`] cancels every subscription and closes every
//!   channel; later use is a logged no-op.
//!
//! Subscribing spawns a task, so it must happen inside a Tokio runtime.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{Event, EventError};
pub use publisher::EventBus;
pub use subscriber::{EventStream, Subscription, SubscriptionState};

/// Events buffered per channel before slow subscribers start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
