//! Caught panic payloads.
//!
//! Every registry that isolates callbacks with `catch_unwind` reports the
//! panic as text.

use std::any::Any;

/// Text of a caught panic payload.
#[must_use]
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
