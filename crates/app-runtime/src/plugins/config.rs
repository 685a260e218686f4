//! Sequencer settings.

use std::time::Duration;

use tracing::warn;

/// Environment variable holding the per-hook timeout in milliseconds.
pub const HOOK_TIMEOUT_ENV: &str = "KEEL_HOOK_TIMEOUT_MS";

/// Settings for the plugin sequencer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Upper bound for any single async hook. `None` waits forever.
    pub hook_timeout: Option<Duration>,
}

impl SequencerConfig {
    /// Bound every async hook by `limit`.
    #[must_use]
    pub fn with_hook_timeout(limit: Duration) -> Self {
        Self {
            hook_timeout: Some(limit),
        }
    }

    /// Load from environment variables.
    ///
    /// `KEEL_HOOK_TIMEOUT_MS=0` or an unparsable value means no timeout.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(HOOK_TIMEOUT_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        let hook_timeout = value.and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => {
                warn!(value = raw, "Ignoring invalid {}", HOOK_TIMEOUT_ENV);
                None
            }
        });
        Self { hook_timeout }
    }
}
