//! # Events
//!
//! The immutable value delivered to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Metadata;
use thiserror::Error;
use uuid::Uuid;

/// A named, timestamped broadcast.
///
/// Constructed fresh on every fire and shared between subscribers behind an
/// `Arc`, so no subscriber can alter what another one sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique per fire.
    pub id: Uuid,
    /// Event name, e.g. `"user.login"`.
    pub name: String,
    /// Payload.
    pub data: Value,
    /// When the event was fired.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata supplied by the publisher.
    pub metadata: Metadata,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(name: impl Into<String>, data: Value, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            data,
            timestamp: Utc::now(),
            metadata,
        }
    }

    /// Look up one metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Failure reported by an event handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The handler returned an error.
    #[error("event handler failed: {0}")]
    Handler(String),

    /// The handler panicked.
    #[error("event handler panicked: {0}")]
    Panicked(String),
}

impl EventError {
    /// Shorthand for [`EventError::Handler`].
    pub fn handler(reason: impl Into<String>) -> Self {
        Self::Handler(reason.into())
    }
}
