use std::hint::black_box;

use chrono::{Duration, NaiveDate};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use insar_stack::{
    design_matrices, invert_epoch_series, perp_baseline_time_series, ArrayData, EpochKey, IfgramStack,
    MemoryContainer, PairIndex, PairKey, StackMetadata,
};
use ndarray::Array3;

// =============================================================================
// Synthetic networks
// =============================================================================

/// Every epoch paired with its next `neighbours` acquisitions, 12-day revisit
fn network(num_epoch: usize, neighbours: usize) -> PairIndex {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let epochs: Vec<EpochKey> = (0..num_epoch)
        .map(|i| EpochKey::new(start + Duration::days(12 * i as i64)))
        .collect();
    let mut keys = Vec::new();
    for i in 0..num_epoch {
        for j in (i + 1)..(i + 1 + neighbours).min(num_epoch) {
            keys.push(PairKey::new(epochs[i], epochs[j]));
        }
    }
    PairIndex::from_keys(keys).unwrap()
}

/// Baselines consistent with a linear per-epoch orbit drift
fn baselines(index: &PairIndex) -> Vec<f64> {
    index
        .pairs()
        .iter()
        .map(|p| 3.5 * (p.second as f64 - p.first as f64))
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_design_matrices(c: &mut Criterion) {
    let mut group = c.benchmark_group("design_matrices");
    for num_epoch in [30, 120, 300] {
        let index = network(num_epoch, 3);
        group.bench_with_input(BenchmarkId::from_parameter(num_epoch), &index, |b, index| {
            b.iter(|| design_matrices(black_box(index), None).unwrap())
        });
    }
    group.finish();
}

fn bench_inversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("inversion");
    for num_epoch in [30, 120] {
        let index = network(num_epoch, 3);
        let bperp = baselines(&index);
        group.bench_with_input(BenchmarkId::new("perp_baseline", num_epoch), &index, |b, index| {
            b.iter(|| perp_baseline_time_series(black_box(index), black_box(&bperp)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("epoch_series", num_epoch), &index, |b, index| {
            b.iter(|| invert_epoch_series(black_box(index), black_box(&bperp), None).unwrap())
        });
    }
    group.finish();
}

fn bench_temporal_average(c: &mut Criterion) {
    let index = network(40, 3);
    let num_pair = index.len();
    let phase = Array3::from_shape_fn((num_pair, 128, 128), |(i, r, c)| (i + r + c) as f32 * 0.01);
    let mut metadata = StackMetadata::default();
    metadata.set("WAVELENGTH", 0.0555);
    let stack = IfgramStack::create(
        MemoryContainer::new(),
        index.keys(),
        &vec![0.0; num_pair],
        vec![("unwrapPhase", ArrayData::F32(phase.into_dyn()))],
        metadata,
    )
    .unwrap();

    c.bench_function("temporal_average_unwrap_phase", |b| {
        b.iter(|| stack.temporal_average(black_box("unwrapPhase"), None, true).unwrap())
    });
}

criterion_group!(benches, bench_design_matrices, bench_inversion, bench_temporal_average);
criterion_main!(benches);
