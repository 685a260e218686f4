//! # Plugin Lifecycle Scenarios
//!
//! Phase barriers, reverse stop order and per-plugin failure isolation,
//! observed through the composition root.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use app_runtime::{
        AppContext, Bootstrapper, Plugin, PluginContext, PluginError, PluginPhase, PluginState,
        SequencerConfig, StaticConfigSource,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use shared_types::{AppLifecycleState, ComponentKey};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail_init: bool,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
                fail_init: false,
            })
        }

        fn failing_init(name: &'static str, journal: &Journal) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
                fail_init: true,
            })
        }

        fn note(&self, hook: &str) {
            self.journal.lock().push(format!("{}:{}", self.name, hook));
        }
    }

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn register(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.note("register");
            Ok(())
        }

        async fn init(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            // Suspend so a pipelined driver would interleave phases
            tokio::task::yield_now().await;
            self.note("init");
            if self.fail_init {
                return Err(PluginError::failed("database not reachable"));
            }
            Ok(())
        }

        async fn start(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.note("start");
            Ok(())
        }

        async fn on_lifecycle(
            &self,
            _ctx: &PluginContext,
            state: AppLifecycleState,
        ) -> Result<(), PluginError> {
            self.note(state.event_name());
            Ok(())
        }

        async fn stop(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            self.note("stop");
            Ok(())
        }
    }

    fn hooks(journal: &Journal, hook: &str) -> Vec<String> {
        journal
            .lock()
            .iter()
            .filter(|e| e.ends_with(&format!(":{hook}")))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_phases_complete_across_all_plugins() {
        let ctx = AppContext::new();
        let journal = Journal::default();

        Bootstrapper::new(StaticConfigSource::default())
            .plugin(Recorder::new("P1", &journal))
            .plugin(Recorder::new("P2", &journal))
            .plugin(Recorder::new("P3", &journal))
            .run(&ctx)
            .await
            .unwrap();

        let log = journal.lock().clone();
        let last_register = log.iter().rposition(|e| e.ends_with(":register")).unwrap();
        let first_init = log.iter().position(|e| e.ends_with(":init")).unwrap();
        let last_init = log.iter().rposition(|e| e.ends_with(":init")).unwrap();
        let first_start = log.iter().position(|e| e.ends_with(":start")).unwrap();
        assert!(last_register < first_init);
        assert!(last_init < first_start);
    }

    #[tokio::test]
    async fn test_shutdown_stops_in_reverse_registration_order() {
        let ctx = AppContext::new();
        let journal = Journal::default();

        Bootstrapper::new(StaticConfigSource::default())
            .plugin(Recorder::new("P1", &journal))
            .plugin(Recorder::new("P2", &journal))
            .plugin(Recorder::new("P3", &journal))
            .run(&ctx)
            .await
            .unwrap();
        let outcome = ctx.shutdown().await;

        assert!(outcome.is_success());
        assert_eq!(hooks(&journal, "stop"), vec!["P3:stop", "P2:stop", "P1:stop"]);
    }

    #[tokio::test]
    async fn test_single_init_failure_is_isolated() {
        let ctx = AppContext::new();
        let journal = Journal::default();

        let report = Bootstrapper::new(StaticConfigSource::default())
            .plugin(Recorder::new("P1", &journal))
            .plugin(Recorder::failing_init("P2", &journal))
            .plugin(Recorder::new("P3", &journal))
            .run(&ctx)
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failure(&ComponentKey::plugin("P2")).is_some());
        assert_eq!(hooks(&journal, "init"), vec!["P1:init", "P2:init", "P3:init"]);
        assert_eq!(ctx.plugins().state("P1"), PluginState::Started);
        assert_eq!(ctx.plugins().state("P2"), PluginState::Registered);
        assert_eq!(ctx.plugins().state("P3"), PluginState::Started);
    }

    #[tokio::test]
    async fn test_lifecycle_change_reaches_plugins_and_bus() {
        let ctx = AppContext::new();
        let journal = Journal::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = ctx.events().on(AppLifecycleState::Paused.event_name(), move |event| {
            let _ = tx.send(event.name.clone());
            Ok(())
        });

        Bootstrapper::new(StaticConfigSource::default())
            .plugin(Recorder::new("P1", &journal))
            .plugin(Recorder::new("P2", &journal))
            .run(&ctx)
            .await
            .unwrap();
        let outcome = ctx
            .plugins()
            .notify_lifecycle_event(AppLifecycleState::Paused)
            .await;

        assert!(outcome.is_success());
        assert_eq!(hooks(&journal, "app.lifecycle.paused").len(), 2);
        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("app.lifecycle.paused"));
    }

    struct Stalled;

    #[async_trait]
    impl Plugin for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn init(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hook_timeout_keeps_the_phase_moving() {
        let ctx = AppContext::builder()
            .sequencer(SequencerConfig::with_hook_timeout(Duration::from_millis(25)))
            .build();
        let journal = Journal::default();

        let report = Bootstrapper::new(StaticConfigSource::default())
            .plugin(Arc::new(Stalled))
            .plugin(Recorder::new("P2", &journal))
            .run(&ctx)
            .await
            .unwrap();

        assert!(matches!(
            report.failure(&ComponentKey::plugin("stalled")),
            Some(app_runtime::BootstrapFailure::Plugin(PluginError::TimedOut {
                phase: PluginPhase::Init,
                ..
            }))
        ));
        assert_eq!(hooks(&journal, "start"), vec!["P2:start"]);
    }
}
