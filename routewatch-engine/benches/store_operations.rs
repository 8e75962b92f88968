use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use routewatch_engine::{DashboardComposer, Filter, MetricKey, MetricSample, Tab, TimeSeriesStore};

fn samples(n: i64) -> Vec<MetricSample> {
    (0..n).map(|t| MetricSample::new(t, t as f64 * 0.5)).collect()
}

/// Benchmark append on a full buffer (hot path, evicts every time)
fn bench_append_full(c: &mut Criterion) {
    let store = TimeSeriesStore::new(100);
    store.reset(&MetricKey::Latency, samples(100));
    let mut t = 100;

    c.bench_function("append_full_buffer", |b| {
        b.iter(|| {
            t += 1;
            store.append(black_box(&MetricKey::Latency), MetricSample::new(t, 1.0));
        });
    });
}

/// Benchmark the first append to an unseen key (slow path)
fn bench_append_new_key(c: &mut Criterion) {
    c.bench_function("append_new_key", |b| {
        b.iter(|| {
            let store = TimeSeriesStore::new(100);
            store.append(black_box(&MetricKey::from("jitter")), MetricSample::new(1, 1.0));
        });
    });
}

/// Benchmark reset with varying snapshot sizes
fn bench_reset_varying_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset_varying_sizes");
    let store = TimeSeriesStore::new(100);

    for size in [10i64, 100, 1000].iter() {
        let snapshot = samples(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| {
                store.reset(black_box(&MetricKey::Bandwidth), snapshot.clone());
            });
        });
    }
    group.finish();
}

/// Benchmark read with varying capacities
fn bench_read_varying_capacities(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_varying_capacities");

    for capacity in [10usize, 100, 1000].iter() {
        let store = TimeSeriesStore::new(*capacity);
        store.reset(&MetricKey::Throughput, samples(*capacity as i64));

        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, _| {
            b.iter(|| black_box(store.read(&MetricKey::Throughput)));
        });
    }
    group.finish();
}

/// Benchmark composing every tab from a populated store
fn bench_compose_tabs(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let store = TimeSeriesStore::new(100);
    for key in MetricKey::KNOWN {
        store.reset(&key, samples(100));
    }
    let filter = Filter::default();

    for tab in Tab::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(tab), &tab, |b, &tab| {
            b.iter(|| black_box(DashboardComposer::compose(&store, &filter, tab)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_append_full,
    bench_append_new_key,
    bench_reset_varying_sizes,
    bench_read_varying_capacities,
    bench_compose_tabs
);
criterion_main!(benches);
