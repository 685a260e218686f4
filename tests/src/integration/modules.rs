//! # Capability Module Scenarios
//!
//! Schema validation gating `initialize`, deferred initialization and
//! async capabilities shared between plugins.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use app_runtime::{
        AppContext, BootstrapFailure, Bootstrapper, CapabilityError, CapabilityModule, CapabilityState,
        ModuleContext, ModuleError, Plugin, PluginContext, PluginError, StaticConfigSource,
    };
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use shared_config::{ConfigError, ConfigSchema, FieldType, Violation};
    use shared_types::{ComponentKey, ConfigTree};

    trait Mailer: Send + Sync {
        fn sender(&self) -> String;
    }

    struct SmtpMailer {
        from: String,
    }

    impl Mailer for SmtpMailer {
        fn sender(&self) -> String {
            self.from.clone()
        }
    }

    /// Needs `adapters.smtp.host`; registers an async `Mailer` factory.
    struct SmtpModule {
        initialized: Arc<AtomicUsize>,
        builds: Arc<AtomicUsize>,
    }

    impl SmtpModule {
        fn counted() -> (Arc<Self>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let initialized = Arc::new(AtomicUsize::new(0));
            let builds = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    initialized: Arc::clone(&initialized),
                    builds: Arc::clone(&builds),
                }),
                initialized,
                builds,
            )
        }
    }

    impl CapabilityModule for SmtpModule {
        fn name(&self) -> &str {
            "smtp"
        }

        fn schema(&self) -> Option<ConfigSchema> {
            Some(
                ConfigSchema::new("smtp")
                    .required("host", FieldType::String, "SMTP relay host")
                    .optional("port", FieldType::Integer, "SMTP relay port"),
            )
        }

        fn initialize(&self, ctx: &ModuleContext<'_>, config: &ConfigTree) -> Result<(), ModuleError> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            let from = format!(
                "noreply@{}",
                config.get("host").and_then(Value::as_str).unwrap_or_default()
            );
            let builds = Arc::clone(&self.builds);
            ctx.register_async::<dyn Mailer, _, _>(move || {
                let from = from.clone();
                let builds = Arc::clone(&builds);
                async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(Arc::new(SmtpMailer { from }) as Arc<dyn Mailer>)
                }
            });
            Ok(())
        }
    }

    /// Resolves the mailer during init.
    struct Notifier(&'static str);

    #[async_trait]
    impl Plugin for Notifier {
        fn name(&self) -> &str {
            self.0
        }

        async fn init(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            let mailer = ctx.capabilities().get_async::<dyn Mailer>().await?;
            if mailer.sender().is_empty() {
                return Err(PluginError::failed("mailer has no sender"));
            }
            Ok(())
        }
    }

    fn source(value: Value) -> StaticConfigSource {
        StaticConfigSource::new(value.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_missing_required_field_blocks_initialize() {
        let ctx = AppContext::new();
        let (module, initialized, _) = SmtpModule::counted();

        let report = Bootstrapper::new(source(json!({"adapters": {"smtp": {"port": 25}}})))
            .module(module)
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(initialized.load(Ordering::SeqCst), 0);
        let Some(BootstrapFailure::Module(ModuleError::Config {
            source: ConfigError::Validation(validation),
            ..
        })) = report.failure(&ComponentKey::adapter("smtp"))
        else {
            panic!("expected a validation failure, got {report}");
        };
        assert_eq!(
            validation.violations,
            vec![Violation::MissingField {
                field: "host".into()
            }]
        );
        assert_eq!(validation.fields.len(), 2);
        assert_eq!(validation.input, json!({"port": 25}));
        assert_eq!(ctx.capabilities().state::<dyn Mailer>(), CapabilityState::Unregistered);
    }

    #[tokio::test]
    async fn test_async_capability_is_built_once_for_all_plugins() {
        let ctx = AppContext::new();
        let (module, initialized, builds) = SmtpModule::counted();

        let report = Bootstrapper::new(source(json!({"adapters": {"smtp": {"host": "mail.local"}}})))
            .module(module)
            .plugin(Arc::new(Notifier("alerts")))
            .plugin(Arc::new(Notifier("digest")))
            .run(&ctx)
            .await
            .unwrap();

        assert!(report.succeeded(), "{report}");
        assert_eq!(initialized.load(Ordering::SeqCst), 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.capabilities().state::<dyn Mailer>(), CapabilityState::Cached);

        let (a, b) = tokio::join!(ctx.get_async::<dyn Mailer>(), ctx.get_async::<dyn Mailer>());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deferred_module_initializes_after_bootstrap() {
        let ctx = AppContext::new();
        let (module, initialized, _) = SmtpModule::counted();

        Bootstrapper::new(source(json!({"adapters": {"smtp": {"host": "relay"}}})))
            .deferred_module(module)
            .run(&ctx)
            .await
            .unwrap();
        assert_eq!(initialized.load(Ordering::SeqCst), 0);
        assert!(!ctx.capabilities().is_registered::<dyn Mailer>());

        assert!(ctx.capabilities().initialize_pending().is_empty());
        assert_eq!(initialized.load(Ordering::SeqCst), 1);
        assert!(ctx.capabilities().is_module_initialized("smtp"));
        assert!(matches!(
            ctx.get::<dyn Mailer>(),
            Err(CapabilityError::SyncAsyncMismatch { .. })
        ));
        assert_eq!(
            ctx.get_async::<dyn Mailer>().await.unwrap().sender(),
            "noreply@relay"
        );
    }
}
