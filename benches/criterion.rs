use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use smolder::{
    attack::{Evasion, FastGradientMethod, FrameSaliencyAttack, SaliencyMethod},
    dataset::gaussian_blobs,
    estimator::SoftmaxRegression,
};

fn fast_gradient(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(12345);
    let mut group = c.benchmark_group("fast_gradient");
    for samples_per_class in [8, 32, 128] {
        let dataset = gaussian_blobs(&mut rng, 4, samples_per_class, &[4, 6], 3.0).unwrap();
        let classifier =
            SoftmaxRegression::new(&[4, 6], 4, Some((-8.0, 8.0)), &mut rng).unwrap();
        let attack = FastGradientMethod::new(&classifier, 0.3).unwrap();
        let x = dataset.inputs().clone();
        let y = dataset.targets().clone();
        group.bench_with_input(
            BenchmarkId::new("generate", samples_per_class * 4),
            &samples_per_class,
            |b, _| b.iter(|| black_box(attack.generate(&x, Some(&y)).unwrap())),
        );
    }
    group.finish();
}

fn frame_saliency(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(54321);
    let mut group = c.benchmark_group("frame_saliency");
    let dataset = gaussian_blobs(&mut rng, 4, 16, &[4, 6], 3.0).unwrap();
    let classifier = SoftmaxRegression::new(&[4, 6], 4, Some((-8.0, 8.0)), &mut rng).unwrap();
    let attacker = FastGradientMethod::new(&classifier, 0.3).unwrap();
    let x = dataset.inputs().clone();
    let y = dataset.targets().clone();
    for method in [
        SaliencyMethod::IterativeSaliency,
        SaliencyMethod::IterativeSaliencyRefresh,
    ] {
        let attack = FrameSaliencyAttack::new(&classifier, &attacker, method);
        group.bench_with_input(
            BenchmarkId::new("generate", format!("{method:?}")),
            &method,
            |b, _| b.iter(|| black_box(attack.generate(&x, Some(&y)).unwrap())),
        );
    }
    group.finish();
}

criterion_group!(bench_attacks, fast_gradient, frame_saliency);
criterion_main!(bench_attacks);
