//! Feature plugins and the sequencer that drives them.

pub mod config;
pub mod plugin;
pub mod sequencer;

pub use config::{SequencerConfig, HOOK_TIMEOUT_ENV};
pub use plugin::{Plugin, PluginContext, PluginPhase, PluginState};
pub use sequencer::{PhaseOutcome, PluginSequencer, Registration};
