use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use routewatch_engine::{StreamIngester, TimeSeriesStore};
use std::sync::Arc;

fn update_frame(metrics: usize) -> Vec<u8> {
    let keys = [
        "bandwidth",
        "latency",
        "packetLoss",
        "throughput",
        "bgpConvergence",
        "ospfConvergence",
        "isisConvergence",
        "trafficShapingEffectiveness",
        "netemImpact",
    ];
    let data: serde_json::Map<String, serde_json::Value> = keys
        .iter()
        .cycle()
        .take(metrics)
        .enumerate()
        .map(|(i, key)| {
            let name = if i < keys.len() {
                key.to_string()
            } else {
                format!("{key}_{i}")
            };
            (name, serde_json::json!({"timestamp": 1_700_000_000_000i64 + i as i64, "value": 1.5}))
        })
        .collect();

    serde_json::to_vec(&serde_json::json!({"type": "metrics_update", "data": data})).unwrap()
}

/// Benchmark ingesting metrics_update frames of varying width
fn bench_ingest_varying_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_metrics_update");
    let ingester = StreamIngester::new(Arc::new(TimeSeriesStore::new(100)));

    for metrics in [1usize, 9, 50].iter() {
        let frame = update_frame(*metrics);
        group.throughput(Throughput::Elements(*metrics as u64));
        group.bench_with_input(BenchmarkId::from_parameter(metrics), &frame, |b, frame| {
            b.iter(|| ingester.ingest(black_box(frame)));
        });
    }
    group.finish();
}

/// Benchmark the drop paths
fn bench_ingest_rejected(c: &mut Criterion) {
    let ingester = StreamIngester::new(Arc::new(TimeSeriesStore::new(100)));

    c.bench_function("ingest_ignored_type", |b| {
        b.iter(|| ingester.ingest(black_box(br#"{"type":"router_status","data":{}}"#)));
    });
    c.bench_function("ingest_malformed", |b| {
        b.iter(|| ingester.ingest(black_box(b"{\"type\":")));
    });
}

criterion_group!(benches, bench_ingest_varying_width, bench_ingest_rejected);
criterion_main!(benches);
