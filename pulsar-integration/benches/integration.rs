use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pulsar_integration::{
    generate, reference, simulate, IntegrationConf, IntegrationMode, ObservationShape,
    ScalarType,
};

/// Deterministic pseudo-random f32 values in [0, 1) using an LCG.
fn random_data(n: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 40) as f32 / (1u64 << 24) as f32
        })
        .collect()
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let shape = ObservationShape::new(256, 4096).with_beams(4);
    let scalar = ScalarType::of::<f32>();

    for &items in &[1u32, 4, 16] {
        let conf = IntegrationConf::new(128, items);
        for mode in IntegrationMode::ALL {
            group.bench_with_input(
                BenchmarkId::new(mode.to_string(), format!("items{}", items)),
                &items,
                |b, _| {
                    b.iter(|| {
                        generate(mode, black_box(&conf), &shape, &scalar, 16, 128).unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference");

    for &samples in &[1024u32, 8192] {
        let shape = ObservationShape::new(64, samples);
        let kernel = generate(
            IntegrationMode::DmsSamples,
            &IntegrationConf::new(32, 1),
            &shape,
            &ScalarType::of::<f32>(),
            8,
            128,
        )
        .unwrap();
        let input = random_data(kernel.geometry().layouts.input.len(), 42);

        group.bench_with_input(
            BenchmarkId::new("dms_samples", format!("64x{}", samples)),
            &samples,
            |b, _| {
                b.iter(|| {
                    reference::integrate(
                        IntegrationMode::DmsSamples,
                        &shape,
                        8,
                        128,
                        black_box(&input),
                    )
                    .unwrap()
                })
            },
        );

        let mut output = vec![0.0f32; kernel.geometry().layouts.output.len()];
        group.bench_with_input(
            BenchmarkId::new("simulated_dms_samples", format!("64x{}", samples)),
            &samples,
            |b, _| b.iter(|| simulate::execute(&kernel, black_box(&input), &mut output).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_reference);
criterion_main!(benches);
