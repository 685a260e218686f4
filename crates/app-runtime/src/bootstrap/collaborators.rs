//! External collaborators driven by the orchestrator's infrastructure steps.

use std::sync::Arc;

use async_trait::async_trait;
use shared_bus::EventBus;
use shared_config::ConfigResolver;
use shared_types::ConfigTree;

use crate::error::BoxError;

/// Supplies the already-parsed configuration tree.
///
/// File formats and parsing live upstream of this trait.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<ConfigTree, BoxError>;
}

/// A configuration source backed by an in-memory tree.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    tree: ConfigTree,
}

impl StaticConfigSource {
    #[must_use]
    pub fn new(tree: ConfigTree) -> Self {
        Self { tree }
    }
}

impl From<ConfigTree> for StaticConfigSource {
    fn from(tree: ConfigTree) -> Self {
        Self::new(tree)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn load(&self) -> Result<ConfigTree, BoxError> {
        Ok(self.tree.clone())
    }
}

/// Persistence backend, initialized once before any module runs.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    async fn initialize(&self, config: &ConfigResolver) -> Result<(), BoxError>;
}

/// Navigation layer, wired to the context's event bus before modules run.
pub trait NavigationBridge: Send + Sync {
    fn attach(&self, events: Arc<EventBus>) -> Result<(), BoxError>;
}
