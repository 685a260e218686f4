//! # Runtime Entities
//!
//! Identity and contribution types that flow between the registries.
//!
//! ## Clusters
//!
//! - **Identity**: [`ComponentKind`], [`ComponentKey`]
//! - **Lifecycle**: [`AppLifecycleState`]
//! - **Navigation**: [`RouteContribution`], [`TabContribution`]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Metadata;
use crate::errors::ComponentKeyError;

// =============================================================================
// IDENTITY
// =============================================================================

/// The two kinds of independently-authored components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    /// A backend-integration module supplying capability factories.
    Adapter,
    /// A feature module driven through the staged lifecycle.
    Plugin,
}

impl ComponentKind {
    /// The key prefix for this kind.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Adapter => "adapter",
            Self::Plugin => "plugin",
        }
    }

    /// The configuration root under which components of this kind live.
    #[must_use]
    pub fn config_root(&self) -> &'static str {
        match self {
            Self::Adapter => "adapters",
            Self::Plugin => "plugins",
        }
    }
}

/// Identifier of one component, rendered as `adapter:<name>` or `plugin:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentKey {
    /// The component kind.
    pub kind: ComponentKind,
    /// The component name as declared by the component itself.
    pub name: String,
}

impl ComponentKey {
    /// Key for a capability module.
    pub fn adapter(name: impl Into<String>) -> Self {
        Self {
            kind: ComponentKind::Adapter,
            name: name.into(),
        }
    }

    /// Key for a plugin.
    pub fn plugin(name: impl Into<String>) -> Self {
        Self {
            kind: ComponentKind::Plugin,
            name: name.into(),
        }
    }

    /// The configuration path of this component's slice, e.g. `plugins.auth`.
    #[must_use]
    pub fn config_path(&self) -> String {
        format!("{}.{}", self.kind.config_root(), self.name)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.name)
    }
}

impl FromStr for ComponentKey {
    type Err = ComponentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = s
            .split_once(':')
            .ok_or_else(|| ComponentKeyError::MissingPrefix(s.to_string()))?;
        if name.is_empty() {
            return Err(ComponentKeyError::EmptyName(s.to_string()));
        }
        match prefix {
            "adapter" => Ok(Self::adapter(name)),
            "plugin" => Ok(Self::plugin(name)),
            other => Err(ComponentKeyError::UnknownKind(other.to_string())),
        }
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Host application lifecycle states broadcast to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppLifecycleState {
    /// The application is visible and receiving input.
    Resumed,
    /// The application is visible but not receiving input.
    Inactive,
    /// The application is not visible.
    Hidden,
    /// The application is in the background.
    Paused,
    /// The application is still running but detached from its host view.
    Detached,
}

impl AppLifecycleState {
    /// The event name the composition root uses when mirroring the state onto the bus.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Resumed => "app.lifecycle.resumed",
            Self::Inactive => "app.lifecycle.inactive",
            Self::Hidden => "app.lifecycle.hidden",
            Self::Paused => "app.lifecycle.paused",
            Self::Detached => "app.lifecycle.detached",
        }
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// A route declared by a plugin.
///
/// The runtime only collects route tables; `view` names an entry in the view
/// registry that a navigation collaborator builds when the route is visited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteContribution {
    /// Route path, unique across the merged table.
    pub path: String,
    /// Name of the view builder serving this route.
    pub view: String,
    /// Extra data passed along to the navigation collaborator.
    #[serde(default)]
    pub metadata: Metadata,
}

impl RouteContribution {
    /// Create a route for `path` served by `view`.
    pub fn new(path: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            view: view.into(),
            metadata: Metadata::new(),
        }
    }
}

/// A navigation tab declared by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabContribution {
    /// Unique tab identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Optional icon name, interpreted by the presentation layer.
    pub icon: Option<String>,
    /// Route opened when the tab is selected.
    pub route: String,
    /// Sort key; lower comes first.
    pub order: i32,
}

impl TabContribution {
    /// Create a tab with no icon.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        route: impl Into<String>,
        order: i32,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: None,
            route: route.into(),
            order,
        }
    }

    /// Attach an icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}
