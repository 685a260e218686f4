//! # Shared Services
//!
//! The registries every module is handed. Cloning is cheap and every clone
//! points at the same instances.

use std::sync::Arc;

use shared_bus::EventBus;
use shared_config::ConfigResolver;
use shared_hooks::HookRegistry;

use crate::views::ViewRegistry;

/// Handles to the registries owned by one composition root.
#[derive(Clone, Default, Debug)]
pub struct Services {
    /// Layered configuration.
    pub config: Arc<ConfigResolver>,
    /// Synchronous transformation pipelines.
    pub hooks: Arc<HookRegistry>,
    /// Named publish/subscribe.
    pub events: Arc<EventBus>,
    /// Named view builders.
    pub views: Arc<ViewRegistry>,
}

impl Services {
    /// Bundle existing registries.
    #[must_use]
    pub fn new(
        config: Arc<ConfigResolver>,
        hooks: Arc<HookRegistry>,
        events: Arc<EventBus>,
        views: Arc<ViewRegistry>,
    ) -> Self {
        Self {
            config,
            hooks,
            events,
            views,
        }
    }
}
