use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use jsondb_infra::jobs::{JobQueue, QueueConfig};
use jsondb_infra::{JsonStore, StoreConfig};
use serde_json::json;

fn open_store(dir: &tempfile::TempDir) -> JsonStore {
    let config = StoreConfig::default().with_root(dir.path().join("db"));
    JsonStore::open(config).unwrap()
}

/// Round trip through the worker with no file I/O.
fn bench_queue_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_overhead");
    let queue = JobQueue::start(QueueConfig::default().with_name("bench-queue")).unwrap();

    group.bench_function("submit_and_wait", |b| {
        b.iter(|| black_box(queue.run(|| Ok(1u64)).unwrap()));
    });

    group.finish();
}

/// `get` cost grows with table size since the whole file is parsed each time.
fn bench_get_by_table_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_by_table_size");

    for size in [10usize, 100, 1000].iter() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        for i in 0..*size {
            store.insert("bench.json", &format!("key-{i}"), json!({"n": i}));
        }

        group.bench_with_input(BenchmarkId::new("get", size), size, |b, &size| {
            let key = format!("key-{}", size / 2);
            b.iter(|| black_box(store.get("bench.json", &key)));
        });
    }

    group.finish();
}

fn bench_upsert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_throughput");
    group.throughput(Throughput::Elements(1));

    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    group.bench_function("upsert_same_key", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            black_box(store.upsert("bench.json", "counter", json!(n)))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_queue_overhead,
    bench_get_by_table_size,
    bench_upsert_throughput
);
criterion_main!(benches);
