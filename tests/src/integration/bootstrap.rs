//! # Bootstrap Scenarios
//!
//! Full orchestration runs over a fresh `AppContext`:
//!
//! 1. Two capability modules register a factory for the same type; the later
//!    module's factory is the one resolved.
//! 2. A plugin configured `active: false` never joins the run.
//! 3. Infrastructure failures abort; component failures are reported.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use app_runtime::{
        AppContext, BootstrapError, BootstrapFailure, Bootstrapper, BoxError, CapabilityModule,
        ConfigSource, ModuleContext, ModuleError, Plugin, PluginContext, PluginError,
        StaticConfigSource,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use shared_types::{ComponentKey, ConfigTree, RouteContribution};

    // =========================================================================
    // FIXTURES
    // =========================================================================

    trait Storage: Send + Sync {
        fn origin(&self) -> &'static str;
    }

    struct Tagged(&'static str);

    impl Storage for Tagged {
        fn origin(&self) -> &'static str {
            self.0
        }
    }

    /// Registers a `Storage` factory tagged with the module's name.
    struct StorageModule(&'static str);

    impl CapabilityModule for StorageModule {
        fn name(&self) -> &str {
            self.0
        }

        fn initialize(&self, ctx: &ModuleContext<'_>, _config: &ConfigTree) -> Result<(), ModuleError> {
            let origin = self.0;
            ctx.register::<dyn Storage, _>(move |_| Ok(Arc::new(Tagged(origin)) as Arc<dyn Storage>));
            Ok(())
        }
    }

    /// Counts every hook call.
    struct Tracked {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(name: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    name,
                    calls: Arc::clone(&calls),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Plugin for Tracked {
        fn name(&self) -> &str {
            self.name
        }

        fn routes(&self) -> Vec<RouteContribution> {
            vec![RouteContribution::new(format!("/{}", self.name), self.name)]
        }

        fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn init(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.get::<dyn Storage>()?;
            Ok(())
        }

        async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn source(value: Value) -> StaticConfigSource {
        StaticConfigSource::new(value.as_object().cloned().unwrap_or_default())
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    #[tokio::test]
    async fn test_end_to_end_bootstrap() {
        let ctx = AppContext::new();
        let (x, x_calls) = Tracked::new("X");
        let (y, y_calls) = Tracked::new("Y");

        let report = Bootstrapper::new(source(json!({"plugins": {"Y": {"active": false}}})))
            .module(Arc::new(StorageModule("A")))
            .module(Arc::new(StorageModule("B")))
            .plugin(x)
            .plugin(y)
            .run(&ctx)
            .await
            .unwrap();

        assert!(report.succeeded(), "{report}");
        assert_eq!(ctx.get::<dyn Storage>().unwrap().origin(), "B");
        assert!(ctx.has_plugin("X"));
        assert!(!ctx.has_plugin("Y"));

        assert_eq!(x_calls.load(Ordering::SeqCst), 3);
        assert_eq!(y_calls.load(Ordering::SeqCst), 0);
        assert!(report.timings.contains_key("X"));
        assert!(!report.timings.contains_key("Y"));

        let paths: Vec<String> = ctx.plugins().routes().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/X"]);
    }

    #[tokio::test]
    async fn test_missing_capability_is_reported_per_plugin() {
        let ctx = AppContext::new();
        let (x, _) = Tracked::new("X");

        let report = Bootstrapper::new(StaticConfigSource::default())
            .plugin(x)
            .run(&ctx)
            .await
            .unwrap();

        assert!(!report.succeeded());
        assert!(matches!(
            report.failure(&ComponentKey::plugin("X")),
            Some(BootstrapFailure::Plugin(PluginError::Capability(_)))
        ));
        // Start still ran for the plugin whose init failed
        assert!(report.timings["X"].start.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_module_is_reported_once() {
        let ctx = AppContext::new();
        let report = Bootstrapper::new(StaticConfigSource::default())
            .module(Arc::new(StorageModule("A")))
            .module(Arc::new(StorageModule("A")))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failure(&ComponentKey::adapter("A")),
            Some(BootstrapFailure::Module(ModuleError::AlreadyRegistered(_)))
        ));
        assert_eq!(ctx.get::<dyn Storage>().unwrap().origin(), "A");
    }

    struct Unreachable;

    #[async_trait]
    impl ConfigSource for Unreachable {
        async fn load(&self) -> Result<ConfigTree, BoxError> {
            Err("config server unreachable".into())
        }
    }

    #[tokio::test]
    async fn test_config_failure_registers_nothing() {
        let ctx = AppContext::new();
        let (x, calls) = Tracked::new("X");

        let err = Bootstrapper::new(Unreachable)
            .module(Arc::new(StorageModule("A")))
            .plugin(x)
            .run(&ctx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("config server unreachable"));
        assert!(matches!(err, BootstrapError::Config(_)));
        assert!(!ctx.capabilities().has_module("A"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_two_contexts_share_nothing() {
        let first = AppContext::new();
        let second = AppContext::new();

        Bootstrapper::new(StaticConfigSource::default())
            .module(Arc::new(StorageModule("A")))
            .run(&first)
            .await
            .unwrap();
        Bootstrapper::new(StaticConfigSource::default())
            .module(Arc::new(StorageModule("B")))
            .run(&second)
            .await
            .unwrap();

        assert_eq!(first.get::<dyn Storage>().unwrap().origin(), "A");
        assert_eq!(second.get::<dyn Storage>().unwrap().origin(), "B");
    }
}
