//! Benchmark tests for the bound-mode convolution kernels

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skipconv::{
    Activation, BoundMode, ConvConfig, Convolution, ForwardOptions, SliceModelBin, Tensor3,
};

// Test utilities
fn random_tensor(rng: &mut StdRng, c: usize, h: usize, w: usize) -> Tensor3 {
    Tensor3::from_shape_fn(c, h, w, |_| rng.gen_range(-1.0..1.0))
}

fn drift(rng: &mut StdRng, frame: &Tensor3, magnitude: f32) -> Tensor3 {
    let (c, h, w) = frame.shape();
    Tensor3::from_shape_fn(c, h, w, |(q, y, x)| {
        frame.get(q, y, x) + rng.gen_range(-magnitude..magnitude)
    })
}

/// A mostly-negative layer: weights small, bias pulling outputs below zero,
/// the regime the bound modes are built for.
fn benchmark_operator(rng: &mut StdRng, mode: BoundMode) -> Convolution {
    let num_output = 16;
    let inch = 8;
    let config = ConvConfig {
        num_output,
        kernel_w: 3,
        kernel_h: 3,
        bias_term: true,
        weight_data_size: num_output * inch * 9,
        ..ConvConfig::default()
    };
    let mut data: Vec<f32> = (0..config.weight_data_size)
        .map(|_| rng.gen_range(-0.1..0.1))
        .collect();
    data.extend((0..num_output).map(|_| rng.gen_range(-1.5..-0.5)));

    let mut conv = Convolution::new(config, Activation::Relu).unwrap();
    conv.load_model(&mut SliceModelBin::new(&data)).unwrap();
    conv.set_bound_mode(mode);
    conv
}

fn benchmark_exact_vs_bound(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(99);
    let frame1 = random_tensor(&mut rng, 8, 32, 32);
    let frame2 = drift(&mut rng, &frame1, 0.02);

    let mut group = c.benchmark_group("steady_stream");

    let modes = [
        ("exact", BoundMode::Exact),
        ("temporal", BoundMode::Temporal),
        ("temporal_top_e", BoundMode::TemporalTopE),
        ("spatial", BoundMode::Spatial),
        ("temporal_spatial", BoundMode::TemporalSpatial),
    ];

    for (name, mode) in modes {
        let mut conv = benchmark_operator(&mut rng, mode);
        let opt = if mode == BoundMode::Exact {
            ForwardOptions::default()
        } else {
            ForwardOptions::bound()
        };
        // Seed the caches outside the measurement.
        conv.forward(&frame1, &opt).unwrap();

        group.bench_function(name, |b| {
            b.iter(|| black_box(conv.forward(black_box(&frame2), &opt).unwrap()))
        });
    }

    group.finish();
}

fn benchmark_drift_magnitudes(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(100);
    let frame1 = random_tensor(&mut rng, 8, 32, 32);

    let mut group = c.benchmark_group("drift_magnitude");

    for magnitude in [0.005f32, 0.02, 0.1, 0.5] {
        let frame2 = drift(&mut rng, &frame1, magnitude);
        let mut conv = benchmark_operator(&mut rng, BoundMode::TemporalSpatial);
        let opt = ForwardOptions::bound();
        conv.forward(&frame1, &opt).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(magnitude),
            &frame2,
            |b, frame| b.iter(|| black_box(conv.forward(black_box(frame), &opt).unwrap())),
        );
    }

    group.finish();
}

fn benchmark_first_call_seeding(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(101);
    let frame = random_tensor(&mut rng, 8, 32, 32);

    c.bench_function("first_call_seed", |b| {
        b.iter(|| {
            let mut conv = benchmark_operator(&mut rng, BoundMode::Temporal);
            black_box(conv.forward(black_box(&frame), &ForwardOptions::bound()).unwrap())
        })
    });
}

criterion_group!(
    benches,
    benchmark_exact_vs_bound,
    benchmark_drift_magnitudes,
    benchmark_first_call_seeding,
);

criterion_main!(benches);
