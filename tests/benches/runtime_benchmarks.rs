//! # Keel Runtime Benchmarks
//!
//! Hot paths a running application hits on every request:
//!
//! | Path | Expectation |
//! |------|-------------|
//! | Cached capability lookup | one lock, one downcast |
//! | Hook pipeline execute | linear in callback count |
//! | Event fire | constant in subscriber count |
//! | Config lookup | linear in path depth |

use std::sync::Arc;
use std::time::Duration;

use app_runtime::CapabilityRegistry;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use shared_bus::EventBus;
use shared_config::ConfigResolver;
use shared_hooks::HookRegistry;
use shared_types::Metadata;

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        42
    }
}

fn bench_capability_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("capabilities");
    let registry = CapabilityRegistry::default();
    registry.register::<dyn Clock, _>(|_| Ok(Arc::new(FixedClock) as Arc<dyn Clock>));
    let _ = registry.get::<dyn Clock>();

    group.bench_function("get_cached", |b| {
        b.iter(|| black_box(registry.get::<dyn Clock>().map(|clock| clock.now())))
    });
    group.finish();
}

fn bench_hook_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("hooks");
    for size in [1, 10, 100] {
        let hooks = HookRegistry::new();
        for priority in 0..size {
            hooks.register("score", priority, |v: i64| Ok(v.wrapping_add(1)));
        }
        group.bench_with_input(BenchmarkId::new("execute", size), &hooks, |b, hooks| {
            b.iter(|| black_box(hooks.execute("score", black_box(0_i64))))
        });
    }
    group.finish();
}

fn bench_event_fire(c: &mut Criterion) {
    let mut group = c.benchmark_group("events");
    group.measurement_time(Duration::from_secs(5));
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| panic!("runtime: {e}"));

    for subscribers in [0, 10] {
        let bus = EventBus::new();
        runtime.block_on(async {
            for _ in 0..subscribers {
                let _ = bus.on("tick", |_| Ok(()));
            }
        });
        group.bench_with_input(BenchmarkId::new("fire", subscribers), &bus, |b, bus| {
            b.iter(|| black_box(bus.fire("tick", json!(1), Metadata::new())))
        });
    }
    group.finish();
}

fn bench_config_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");
    let resolver = ConfigResolver::with_tree(
        json!({"plugins": {"auth": {"session": {"ttl": 3600}}}})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );

    group.bench_function("get_raw_hit", |b| {
        b.iter(|| black_box(resolver.get("plugins:auth:session:ttl")))
    });
    group.bench_function("get_fallback", |b| {
        b.iter(|| black_box(resolver.get_or("plugins:auth:missing", json!(0))))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_capability_lookup,
    bench_hook_pipeline,
    bench_event_fire,
    bench_config_lookup
);
criterion_main!(benches);
