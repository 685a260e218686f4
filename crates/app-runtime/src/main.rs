//! # Keel Demo Runtime
//!
//! Boots a small application end to end:
//!
//! 1. Load configuration (`KEEL_CONFIG` JSON file, then env overrides)
//! 2. Register the in-memory key/value capability module
//! 3. Register the sample plugins
//! 4. Run init and start, report, deliver a lifecycle change
//! 5. Shut down in reverse order
//!
//! ## Environment
//!
//! - `KEEL_LOG` - tracing filter, default `info`
//! - `KEEL_CONFIG` - path to a JSON configuration file
//! - `KEEL_PLUGIN_<NAME>_ACTIVE` - `true`/`false` override per plugin
//! - `KEEL_HOOK_TIMEOUT_MS` - per-hook timeout, `0` disables

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared_config::{ConfigSchema, FieldType};
use shared_types::{
    merge_at, AppLifecycleState, ConfigTree, Metadata, RouteContribution, TabContribution,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app_runtime::{
    AppContext, Bootstrapper, CapabilityFactory, CapabilityModule, ModuleContext, ModuleError,
    Plugin, PluginContext, PluginError, SequencerConfig, StaticConfigSource, ViewProps,
};

const SAMPLE_PLUGINS: [&str; 3] = ["greeter", "audit", "beta"];

/// Storage capability handed to plugins.
trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: Value);
    fn get(&self, key: &str) -> Option<Value>;
}

struct MemoryStore {
    namespace: String,
    entries: RwLock<HashMap<String, Value>>,
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: Value) {
        self.entries
            .write()
            .insert(format!("{}/{}", self.namespace, key), value);
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .get(&format!("{}/{}", self.namespace, key))
            .cloned()
    }
}

/// Capability module configured under `adapters.memory`.
struct MemoryModule;

impl CapabilityModule for MemoryModule {
    fn name(&self) -> &str {
        "memory"
    }

    fn schema(&self) -> Option<ConfigSchema> {
        Some(
            ConfigSchema::new("memory")
                .required("namespace", FieldType::String, "Key prefix for every entry")
                .optional("seed", FieldType::Object, "Entries written on first use"),
        )
    }

    fn initialize(&self, ctx: &ModuleContext<'_>, config: &ConfigTree) -> Result<(), ModuleError> {
        let namespace = config
            .get("namespace")
            .and_then(Value::as_str)
            .ok_or_else(|| ctx.error("namespace must be a string"))?
            .to_string();
        let seed = config
            .get("seed")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        ctx.register_factory(
            CapabilityFactory::<dyn KeyValueStore>::new(move |_| {
                Ok(Arc::new(MemoryStore {
                    namespace: namespace.clone(),
                    entries: RwLock::new(HashMap::new()),
                }) as Arc<dyn KeyValueStore>)
            })
            .with_init(move |store| {
                for (key, value) in &seed {
                    store.put(key, value.clone());
                }
                Ok(())
            }),
        );
        Ok(())
    }
}

/// Decorates page titles and counts visits in the store.
struct GreeterPlugin;

#[async_trait]
impl Plugin for GreeterPlugin {
    fn name(&self) -> &str {
        "greeter"
    }

    fn default_settings(&self) -> ConfigTree {
        json!({"salutation": "Hello"})
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    fn routes(&self) -> Vec<RouteContribution> {
        vec![RouteContribution::new("/hello", "greeting")]
    }

    fn tabs(&self) -> Vec<TabContribution> {
        vec![TabContribution::new("hello", "Hello", "/hello", 10)]
    }

    fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let salutation: String = ctx.setting("salutation", "Hello".to_string());
        ctx.hooks()
            .register("page.title", 10, move |title: String| Ok(format!("{salutation}, {title}")));
        ctx.views().register("greeting", |props: &ViewProps| {
            format!("<h1>{}</h1>", props.data["name"].as_str().unwrap_or("stranger"))
        });
        Ok(())
    }

    async fn init(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let store = ctx.get::<dyn KeyValueStore>()?;
        let visits = store.get("visits").and_then(|v| v.as_u64()).unwrap_or(0);
        store.put("visits", json!(visits + 1));
        Ok(())
    }

    async fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.events()
            .fire("greeter.ready", json!({"plugin": ctx.name()}), Metadata::new());
        Ok(())
    }
}

/// Logs every lifecycle change it hears about.
struct AuditPlugin;

#[async_trait]
impl Plugin for AuditPlugin {
    fn name(&self) -> &str {
        "audit"
    }

    fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        for state in [AppLifecycleState::Paused, AppLifecycleState::Resumed] {
            ctx.events().on(state.event_name(), |event| {
                info!(event = %event.name, "Audit observed lifecycle change");
                Ok(())
            });
        }
        ctx.events().on("greeter.ready", |event| {
            info!(payload = %event.data, "Audit observed greeter start");
            Ok(())
        });
        Ok(())
    }

    async fn on_lifecycle(
        &self,
        ctx: &PluginContext,
        state: AppLifecycleState,
    ) -> Result<(), PluginError> {
        info!(plugin = ctx.name(), ?state, "Lifecycle hook");
        Ok(())
    }

    async fn stop(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        info!(plugin = ctx.name(), "Audit trail closed");
        Ok(())
    }
}

/// Disabled by default through configuration.
struct BetaPlugin;

#[async_trait]
impl Plugin for BetaPlugin {
    fn name(&self) -> &str {
        "beta"
    }

    fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        warn!("Beta features enabled");
        Ok(())
    }
}

/// Load configuration from file and environment.
fn load_config() -> Result<ConfigTree> {
    let mut tree = match std::env::var("KEEL_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {path}"))?;
            match serde_json::from_str::<Value>(&raw)
                .with_context(|| format!("Failed to parse config file {path}"))?
            {
                Value::Object(map) => map,
                other => bail!("Config file {path} must hold an object, found {other}"),
            }
        }
        Err(_) => default_config(),
    };

    // Override plugin activation from environment
    for name in SAMPLE_PLUGINS {
        let var = format!("KEEL_PLUGIN_{}_ACTIVE", name.to_uppercase());
        if let Ok(raw) = std::env::var(&var) {
            match raw.trim().parse::<bool>() {
                Ok(active) => {
                    let mut flag = ConfigTree::new();
                    flag.insert("active".into(), json!(active));
                    merge_at(&mut tree, &["plugins", name], flag);
                }
                Err(_) => warn!(variable = %var, value = %raw, "Ignoring non-boolean override"),
            }
        }
    }

    Ok(tree)
}

fn default_config() -> ConfigTree {
    json!({
        "adapters": {
            "memory": { "namespace": "demo", "seed": { "visits": 0 } }
        },
        "plugins": {
            "beta": { "active": false }
        }
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_env("KEEL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = load_config()?;

    let ctx = AppContext::builder()
        .sequencer(SequencerConfig::from_env())
        .build();

    let report = Bootstrapper::new(StaticConfigSource::new(config))
        .module(Arc::new(MemoryModule))
        .plugin(Arc::new(GreeterPlugin))
        .plugin(Arc::new(AuditPlugin))
        .plugin(Arc::new(BetaPlugin))
        .run(&ctx)
        .await
        .context("Bootstrap aborted")?;
    info!("{report}");

    let title = ctx.hooks().execute("page.title", "Keel".to_string());
    let page: String = ctx
        .views()
        .build_as("greeting", &ViewProps::new(json!({"name": "Keel"})))
        .context("Failed to build greeting view")?;
    info!(%title, %page, routes = ctx.plugins().routes().len(), "Rendered");
    info!(
        active = ?ctx.plugins().plugin_names(),
        inactive = ?ctx.plugins().inactive_plugins(),
        "Plugins"
    );

    ctx.plugins()
        .notify_lifecycle_event(AppLifecycleState::Paused)
        .await;
    tokio::task::yield_now().await;

    let outcome = ctx.shutdown().await;
    if !outcome.is_success() {
        warn!(failures = outcome.failures.len(), "Some plugins failed to stop");
    }
    info!("Shutdown complete");
    Ok(())
}
