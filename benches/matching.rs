//! Benchmark g2NN matching over synthetic features.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use copy_move_forensics::{
    analysis::{MatchStrategy, Matcher},
    features::{Feature, InterestPoints, KeyPoint},
};

/// Pairs of identical descriptors at a fixed offset, plus unmatched clutter.
fn synthetic_points(pairs: usize, clutter: usize) -> InterestPoints {
    let mut features = Vec::with_capacity(2 * pairs + clutter);

    for k in 0..pairs {
        let t = k as f32;
        let descriptor: Vec<f32> = (0..32).map(|d| ((t + 1.0) * (d as f32 + 0.5)).sin()).collect();
        let angle = (k * 37 % 360) as f32;
        let (x, y) = ((k % 40) as f32 * 5.0, (k / 40) as f32 * 5.0);

        features.push(Feature::new(KeyPoint::new(x, y, angle), descriptor.clone()));
        features.push(Feature::new(KeyPoint::new(x + 150.0, y + 90.0, angle + 0.5), descriptor));
    }

    for k in 0..clutter {
        let t = (k + pairs) as f32;
        let descriptor: Vec<f32> = (0..32).map(|d| (t * 0.37 + d as f32).cos()).collect();
        let angle = (k * 53 % 360) as f32;
        features.push(Feature::new(
            KeyPoint::new((k % 60) as f32 * 3.0, (k / 60) as f32 * 3.0, angle),
            descriptor,
        ));
    }

    InterestPoints::new(features, 4.0, 1.2)
}

fn bench_strategies(c: &mut Criterion) {
    let points = synthetic_points(400, 200);
    let mut group = c.benchmark_group("matching_strategy");

    for strategy in [
        MatchStrategy::Exhaustive,
        MatchStrategy::AngleWindow,
        MatchStrategy::NormWindow,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", strategy)),
            &strategy,
            |b, &strategy| {
                let matcher = Matcher::new(&points, strategy);
                b.iter(|| black_box(matcher.run(1).unwrap()))
            },
        );
    }

    group.finish();
}

fn bench_jobs(c: &mut Criterion) {
    let points = synthetic_points(1000, 500);
    let matcher = Matcher::new(&points, MatchStrategy::AngleWindow);
    let mut group = c.benchmark_group("matching_jobs");

    for jobs in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(jobs), &jobs, |b, &jobs| {
            b.iter(|| black_box(matcher.run(jobs).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_jobs);
criterion_main!(benches);
