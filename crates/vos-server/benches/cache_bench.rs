use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use vos_core::{CacheKey, InstanceId, TtlPolicy, paths};
use vos_server::cache::{
    CacheEntry, CacheStats, CacheStore, KeyPattern, MemoryCacheConfig, MemoryStore, SqliteStore,
};
use vos_server::metrics::CacheMetrics;

/// Payload de GetAllCustomers con N clientes
fn create_roster(num_customers: usize) -> Value {
    let briefs: Vec<Value> = (0..num_customers)
        .map(|i| json!({"account": format!("{:06}", i), "money": i as f64, "limitMoney": 0.0}))
        .collect();
    json!({"retCode": 0, "infoCustomerBriefs": briefs})
}

fn memory_store() -> MemoryStore {
    MemoryStore::new(MemoryCacheConfig::default(), CacheMetrics::new())
}

fn key(instance: u32, account: u64) -> CacheKey {
    CacheKey::new(
        InstanceId::new(instance),
        paths::GET_CUSTOMER,
        &json!({"accounts": [account.to_string()]}),
    )
}

/// Benchmark: get (hit)
fn bench_cache_get_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = memory_store();
    let key = key(1, 0);

    rt.block_on(async {
        store
            .put(CacheEntry::new(key.clone(), create_roster(100), Utc::now()))
            .await
            .unwrap();
    });

    c.bench_function("cache_get_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let result = store.get(&key).await;
            std::hint::black_box(result)
        });
    });
}

/// Benchmark: get (miss)
fn bench_cache_get_miss(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = memory_store();

    c.bench_function("cache_get_miss", |b| {
        b.to_async(&rt).iter(|| async {
            let result = store.get(&key(9, 9)).await;
            std::hint::black_box(result)
        });
    });
}

/// Benchmark: put con diferentes tamanos de payload, memoria vs sqlite
fn bench_cache_put_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache_put_sizes");

    for size in [10, 100, 1000] {
        let payload = Arc::new(create_roster(size));
        let stores: [(&str, Arc<dyn CacheStore>); 2] = [
            ("memory", Arc::new(memory_store())),
            ("sqlite", Arc::new(SqliteStore::open_in_memory().unwrap())),
        ];

        group.throughput(Throughput::Elements(1));
        for (backend, store) in stores {
            let counter = Arc::new(AtomicU64::new(0));
            group.bench_with_input(BenchmarkId::new(backend, size), &size, |b, _size| {
                b.to_async(&rt).iter(|| {
                    let store = Arc::clone(&store);
                    let payload = Arc::clone(&payload);
                    let counter = Arc::clone(&counter);
                    async move {
                        let n = counter.fetch_add(1, Ordering::Relaxed);
                        let entry = CacheEntry::new(key(1, n), (*payload).clone(), Utc::now());
                        store.put(entry).await.unwrap();
                    }
                });
            });
        }
    }

    group.finish();
}

/// Benchmark: invalidacion por resource path sobre 1000 entries
fn bench_cache_invalidate_resource(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(memory_store());
    let payload = create_roster(10);
    let pattern = KeyPattern::resource(InstanceId::new(1), paths::GET_CUSTOMER);

    c.bench_function("cache_invalidate_resource_1000", |b| {
        b.to_async(&rt).iter(|| {
            let store = Arc::clone(&store);
            let payload = payload.clone();
            let pattern = pattern.clone();
            async move {
                for n in 0..1000 {
                    store
                        .put(CacheEntry::new(key(1, n), payload.clone(), Utc::now()))
                        .await
                        .unwrap();
                }
                std::hint::black_box(store.invalidate(&pattern).await.unwrap())
            }
        });
    });
}

/// Benchmark: estadisticas sobre 10k entries
fn bench_cache_stats(c: &mut Criterion) {
    let policy = TtlPolicy::standard();
    let now = Utc::now();
    let entries: Vec<CacheEntry> = (0..10_000)
        .map(|n| {
            let path = if n % 2 == 0 { paths::GET_CUSTOMER } else { paths::GET_CDR };
            CacheEntry::new(
                CacheKey::new(InstanceId::new((n % 4) as u32), path, &json!({"n": n})),
                json!({"retCode": 0}),
                now - chrono::TimeDelta::seconds(n as i64),
            )
        })
        .collect();

    c.bench_function("cache_stats_10k", |b| {
        b.iter(|| std::hint::black_box(CacheStats::compute(&entries, &policy, now)));
    });
}

/// Benchmark: Concurrencia - multiples gets simultaneos
fn bench_cache_concurrent_gets(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(memory_store());

    rt.block_on(async {
        for n in 0..1000 {
            store
                .put(CacheEntry::new(key(1, n), create_roster(50), Utc::now()))
                .await
                .unwrap();
        }
    });

    c.bench_function("cache_concurrent_gets_100", |b| {
        b.to_async(&rt).iter(|| {
            let store = Arc::clone(&store);
            async move {
                let handles: Vec<_> = (0..100u64)
                    .map(|i| {
                        let store = Arc::clone(&store);
                        tokio::spawn(async move { store.get(&key(1, i % 1000)).await })
                    })
                    .collect();

                for handle in handles {
                    let _ = handle.await;
                }
            }
        });
    });
}

criterion_group!(
    benches,
    bench_cache_get_hit,
    bench_cache_get_miss,
    bench_cache_put_sizes,
    bench_cache_invalidate_resource,
    bench_cache_stats,
    bench_cache_concurrent_gets,
);

criterion_main!(benches);
