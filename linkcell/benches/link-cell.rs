#![allow(clippy::needless_return)]
use linkcell::{LinkCell, QueryArgs, UnitCell, Vector3D};

use criterion::{BenchmarkGroup, Criterion, measurement::WallTime, SamplingMode};
use criterion::{criterion_group, criterion_main};
use rand::prelude::*;

fn random_points(unit_cell: &UnitCell, n_points: usize) -> Vec<Vector3D> {
    let mut rng = StdRng::seed_from_u64(0xdeadbeef);
    return (0..n_points)
        .map(|_| unit_cell.cartesian(Vector3D::new(rng.gen(), rng.gen(), rng.gen())))
        .collect();
}

fn run_queries(mut group: BenchmarkGroup<WallTime>, test_mode: bool) {
    let n_points = if test_mode { 1_000 } else { 100_000 };
    // keep the density constant at 1 point per unit volume
    let unit_cell = UnitCell::cubic(f64::cbrt(n_points as f64));
    let points = random_points(&unit_cell, n_points);

    group.bench_function("build", |b| b.iter_custom(|repeat| {
        let start = std::time::Instant::now();
        for _ in 0..repeat {
            let link_cell = LinkCell::new(unit_cell, 1.5, &points).unwrap();
            criterion::black_box(link_cell);
        }
        start.elapsed() / n_points as u32
    }));

    let link_cell = LinkCell::new(unit_cell, 1.5, &points).unwrap();
    // warm up the neighbor cells cache
    link_cell.neighbor_list(&points, 1.5, true).unwrap();

    group.bench_function("neighbor list", |b| b.iter_custom(|repeat| {
        let start = std::time::Instant::now();
        for _ in 0..repeat {
            let list = link_cell.neighbor_list(&points, 1.5, true).unwrap();
            criterion::black_box(list);
        }
        start.elapsed() / n_points as u32
    }));

    for r_max in [1.5, 3.0] {
        let query = link_cell.query(&points, &QueryArgs::ball(r_max).exclude_ii(true)).unwrap();
        group.bench_function(&format!("ball query, r_max = {}", r_max), |b| b.iter_custom(|repeat| {
            let start = std::time::Instant::now();
            for _ in 0..repeat {
                criterion::black_box(query.to_neighbor_list());
            }
            start.elapsed() / n_points as u32
        }));
    }

    for k in [4, 16] {
        let query = link_cell.query(&points, &QueryArgs::nearest(k).exclude_ii(true)).unwrap();
        group.bench_function(&format!("nearest neighbors, k = {}", k), |b| b.iter_custom(|repeat| {
            let start = std::time::Instant::now();
            for _ in 0..repeat {
                criterion::black_box(query.to_neighbor_list());
            }
            start.elapsed() / n_points as u32
        }));
    }
}

fn link_cell(c: &mut Criterion) {
    let test_mode = std::env::args().any(|arg| arg == "--test");

    let mut group = c.benchmark_group("Link cell (per point)");
    group.noise_threshold(0.05);
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);

    run_queries(group, test_mode);
}

criterion_group!(all, link_cell);
criterion_main!(all);
