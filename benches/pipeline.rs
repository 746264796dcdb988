//! Criterion benchmarks for merger resolving.
//!
//! Run with: cargo bench
//! Run one group: cargo bench -- flow

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::time::Duration;

use merger_resolver_rs::flow::FlowNetwork;
use merger_resolver_rs::{
    HypothesesModel, InMemoryImageProvider, KMeansMergerResolver, MergerResolvingPipeline,
    PluginRegistry, ResolverConfig, TrackingResult,
};

// =============================================================================
// Synthetic inputs
// =============================================================================

/// Fully connected layers of `width` nodes with random costs
fn dense_network(layers: usize, width: usize, seed: u64) -> (FlowNetwork, usize, usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = layers * width;
    let mut network = FlowNetwork::new(n + 2);
    let (source, sink) = (n, n + 1);
    for i in 0..width {
        network.add_arc(source, i, 1, 0.0);
        network.add_arc((layers - 1) * width + i, sink, 1, 0.0);
    }
    for l in 0..layers - 1 {
        for i in 0..width {
            for j in 0..width {
                network.add_arc(l * width + i, (l + 1) * width + j, 1, rng.gen_range(0.0..1.0));
            }
        }
    }
    (network, source, sink)
}

/// `pairs` merged pairs side by side, merged for `frames - 1` frames and
/// separate in the last one
fn merger_chain(
    pairs: usize,
    frames: usize,
) -> (HypothesesModel, TrackingResult, InMemoryImageProvider) {
    let width = pairs * 20;
    let mut table = serde_json::Map::new();
    let mut detections = Vec::new();
    let mut links = Vec::new();
    let mut provider = InMemoryImageProvider::new();

    for t in 0..frames {
        let last = t + 1 == frames;
        let mut img = Array2::<u32>::zeros((8, width));
        let mut frame = serde_json::Map::new();
        for p in 0..pairs {
            let labels = if last {
                [2 * p as u32 + 1, 2 * p as u32 + 2]
            } else {
                [p as u32 + 1, p as u32 + 1]
            };
            for (k, label) in labels.iter().enumerate() {
                let x0 = p * 20 + k * 10;
                img.slice_mut(ndarray::s![1..7, x0 + 1..x0 + 8]).fill(*label);
            }
            let uid = |label: u32| (t * 1000) as u64 + u64::from(label);
            if last {
                for label in labels {
                    frame.insert(label.to_string(), json!(uid(label)));
                    detections.push(json!({ "id": uid(label), "value": 1 }));
                    let prev = ((t - 1) * 1000) as u64 + p as u64 + 1;
                    links.push(json!({ "src": prev, "dest": uid(label), "value": 1 }));
                }
            } else {
                let label = labels[0];
                frame.insert(label.to_string(), json!(uid(label)));
                detections.push(json!({ "id": uid(label), "value": 2 }));
                if t > 0 {
                    let prev = ((t - 1) * 1000) as u64 + u64::from(label);
                    links.push(json!({ "src": prev, "dest": uid(label), "value": 1 }));
                }
            }
        }
        table.insert(t.to_string(), serde_json::Value::Object(frame));
        provider = provider.with_label_frame(t, img.into_dyn());
    }

    let model = serde_json::from_value(json!({ "traxelToUniqueId": table })).unwrap();
    let result = serde_json::from_value(json!({
        "detectionResults": detections,
        "linkingResults": links,
    }))
    .unwrap();
    (model, result, provider)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow");
    group.measurement_time(Duration::from_secs(5));

    for width in [4, 16, 32] {
        group.bench_function(BenchmarkId::new("dense_layers", width), |b| {
            b.iter_batched(
                || dense_network(5, width, 42),
                |(mut network, source, sink)| network.min_cost_max_flow(source, sink).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for pairs in [2, 8] {
        let (model, result, provider) = merger_chain(pairs, 4);
        let registry =
            PluginRegistry::with_default_features(provider, KMeansMergerResolver::default());
        let pipeline = MergerResolvingPipeline::new(
            ResolverConfig::default().with_transition_weights(vec![1.0, 0.0]),
        );

        group.bench_function(BenchmarkId::new("merger_chain", pairs), |b| {
            b.iter(|| pipeline.run_silent(&model, &result, &registry).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flow, bench_pipeline);
criterion_main!(benches);
