//! Benchmarks for collection route planning.
//!
//! Run with: cargo bench -p bot_exec

use bot_lib::{
    collect::{plan_route, ClampRect},
    geom::{RobotParams, RobotPose},
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;

/// Birdies scattered over a court sized area, with some clustered near the start.
fn scatter(count: usize) -> Vec<Vector3<f64>> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            if i % 5 == 0 {
                // Clustered within the strike radius of the start
                Vector3::new(
                    400.0 + 30.0 * (t * 1.3).cos(),
                    300.0 + 30.0 * (t * 1.3).sin(),
                    2000.0,
                )
            } else {
                Vector3::new(
                    200.0 + (t * 97.0) % 310.0,
                    120.0 + (t * 61.0) % 400.0,
                    2000.0,
                )
            }
        })
        .collect()
}

fn bench_plan_route(c: &mut Criterion) {
    let robot = RobotParams {
        grabber_offset: 40.0,
        grabber_half_angle_rad: 25f64.to_radians(),
    };
    let start = RobotPose::new(Vector3::new(400.0, 300.0, 0.0), 0.0);
    let clamp = ClampRect {
        min: [150.0, 150.0],
        max: [1130.0, 570.0],
    };

    let mut group = c.benchmark_group("plan_route");

    for count in [10usize, 30].iter() {
        let birdies = scatter(*count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &birdies, |b, birdies| {
            b.iter(|| {
                plan_route(
                    black_box(&start),
                    black_box(birdies),
                    &robot,
                    Some(&clamp),
                    1000,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan_route);
criterion_main!(benches);
