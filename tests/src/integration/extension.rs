//! # Extension Point Scenarios
//!
//! Plugins extending each other through the shared registries: hook
//! pipelines, bus events, view builders and layered configuration.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use app_runtime::{
        AppContext, Bootstrapper, Plugin, PluginContext, PluginError, StaticConfigSource,
        ViewProps,
    };
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_hooks::HookError;
    use shared_types::{ConfigTree, Metadata};

    /// Contributes `v + 10` at priority 20.
    struct Adder;

    #[async_trait]
    impl Plugin for Adder {
        fn name(&self) -> &str {
            "adder"
        }

        fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            ctx.hooks().register("score", 20, |v: i64| Ok(v + 10));
            Ok(())
        }
    }

    /// Contributes `v * 2` at priority 10, plus a broken callback in between.
    struct Doubler;

    #[async_trait]
    impl Plugin for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            ctx.hooks().register("score", 10, |v: i64| Ok(v * 2));
            ctx.hooks()
                .register("score", 15, |_: i64| Err(HookError::failed("rules unavailable")));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hooks_from_several_plugins_compose_by_priority() {
        let ctx = AppContext::new();
        Bootstrapper::new(StaticConfigSource::default())
            .plugin(Arc::new(Doubler))
            .plugin(Arc::new(Adder))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(ctx.hooks().count("score"), 3);
        assert_eq!(ctx.hooks().execute("score", 5_i64), 30);
        assert_eq!(ctx.hooks().execute("unknown", 5_i64), 5);
    }

    /// Publishes on start.
    struct Producer;

    #[async_trait]
    impl Plugin for Producer {
        fn name(&self) -> &str {
            "producer"
        }

        async fn start(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            ctx.events()
                .fire_and_wait("catalog.loaded", json!({"items": 3}), Metadata::new())
                .await;
            Ok(())
        }
    }

    /// Subscribes during register, so it hears events fired in start.
    struct Consumer(Arc<Mutex<Vec<Value>>>);

    #[async_trait]
    impl Plugin for Consumer {
        fn name(&self) -> &str {
            "consumer"
        }

        fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            let seen = Arc::clone(&self.0);
            ctx.events().on("catalog.loaded", move |event| {
                seen.lock().push(event.data.clone());
                Ok(())
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_events_flow_between_plugins() {
        let ctx = AppContext::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut stream = ctx.events().stream("catalog.loaded");

        Bootstrapper::new(StaticConfigSource::default())
            .plugin(Arc::new(Producer))
            .plugin(Arc::new(Consumer(Arc::clone(&seen))))
            .run(&ctx)
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.data, json!({"items": 3}));

        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock(), vec![json!({"items": 3})]);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_fire() {
        let ctx = AppContext::new();
        assert_eq!(ctx.events().fire("x", json!(1), Metadata::new()), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = ctx.events().on("x", move |event| {
            sink.lock().push(event.data.clone());
            Ok(())
        });
        ctx.events().fire_and_wait("x", json!(2), Metadata::new()).await;

        tokio::time::timeout(Duration::from_secs(1), async {
            while seen.lock().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(*seen.lock(), vec![json!(2)]);
    }

    /// Registers a view and reads its settings.
    struct Profile;

    #[async_trait]
    impl Plugin for Profile {
        fn name(&self) -> &str {
            "profile"
        }

        fn default_settings(&self) -> ConfigTree {
            json!({"title": "Profile", "avatar_size": 64})
                .as_object()
                .cloned()
                .unwrap_or_default()
        }

        fn register(&self, ctx: &PluginContext) -> Result<(), PluginError> {
            let title: String = ctx.setting("title", String::new());
            ctx.views().register("profile.card", move |props: &ViewProps| {
                props.emit("rendered", props.data.clone());
                format!("{title}: {}", props.data["user"].as_str().unwrap_or("?"))
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_views_and_settings_across_layers() {
        let ctx = AppContext::new();
        Bootstrapper::new(StaticConfigSource::new(
            json!({"plugins": {"profile": {"title": "Account"}}})
                .as_object()
                .cloned()
                .unwrap(),
        ))
        .plugin(Arc::new(Profile))
        .run(&ctx)
        .await
        .unwrap();

        let rendered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&rendered);
        let props = ViewProps::new(json!({"user": "ada"}))
            .with_handler("rendered", move |data| *sink.lock() = Some(data));
        let card: String = ctx.views().build_as("profile.card", &props).unwrap();

        assert_eq!(card, "Account: ada");
        assert_eq!(*rendered.lock(), Some(json!({"user": "ada"})));

        // Defaults resolve through `get` but are invisible to `has`
        assert_eq!(ctx.config().get_as("plugins.profile.avatar_size", 0_u32), 64);
        assert!(!ctx.config().has("plugins:profile:avatar_size"));
        assert!(ctx.config().has("plugins:profile:title"));
    }

    #[test]
    fn test_absent_path_falls_back_even_with_sibling_defaults() {
        let ctx = AppContext::new();
        ctx.config().register_module_defaults(
            "a.b",
            json!({"d": 1}).as_object().cloned().unwrap(),
        );

        assert_eq!(ctx.config().get_as("a:b:c", 5_i64), 5);
        assert!(!ctx.config().has("a:b:c"));

        ctx.config().register_module_defaults(
            "a.b",
            json!({"c": 5}).as_object().cloned().unwrap(),
        );
        assert_eq!(ctx.config().get_as("a:b:c", 0_i64), 5);
        assert!(!ctx.config().has("a:b:c"));
    }
}
