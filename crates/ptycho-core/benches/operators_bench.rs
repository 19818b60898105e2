// -------------------------------------------------------------------------
// SCPN Ptycho-Tomo -- Operator Benchmark
// Compares the Radon and diffraction operator pairs at two problem
// scales, plus the TV gradient/divergence pair on the larger volume.
// -------------------------------------------------------------------------

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use ptycho_core::ptycho::PtychoEngine;
use ptycho_core::simulate::{disk_probe, jittered_scan, slab_object, uniform_angles};
use ptycho_core::tomo::{adjoint_tomo, forward_tomo};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

struct BenchCase {
    label: String,
    u: Array3<Complex64>,
    theta: Array1<f64>,
    probe: Array2<Complex64>,
    scan: Array3<f64>,
    nprb: usize,
    det: [usize; 2],
}

/// Self-contained problem instance at `n x n x nz` with `ntheta` angles.
fn make_case(ntheta: usize, nz: usize, n: usize, nprb: usize, det: usize) -> BenchCase {
    let mut rng = StdRng::seed_from_u64(1);
    BenchCase {
        label: format!("{}x{}x{}@{}", nz, n, n, ntheta),
        u: slab_object(nz, n),
        theta: uniform_angles(ntheta),
        probe: disk_probe(nprb, 0.1),
        scan: jittered_scan(ntheta, (nz, n), nprb / 2, nprb, &mut rng),
        nprb,
        det: [det, det],
    }
}

fn bench_radon_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("radon_forward_adjoint");
    group.sample_size(20);

    for case in [make_case(16, 8, 32, 8, 16), make_case(48, 16, 64, 16, 32)] {
        let proj = forward_tomo(&case.u, &case.theta);
        let n = case.u.dim().1;

        group.bench_function(BenchmarkId::new("forward", &case.label), |b| {
            b.iter(|| black_box(forward_tomo(&case.u, &case.theta)))
        });
        group.bench_function(BenchmarkId::new("adjoint", &case.label), |b| {
            b.iter(|| black_box(adjoint_tomo(&proj, &case.theta, n)))
        });
    }

    group.finish();
}

fn bench_diffraction_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("diffraction_forward_adjoint");
    group.sample_size(20);

    for case in [make_case(8, 8, 32, 8, 16), make_case(8, 16, 64, 16, 32)] {
        let engine = PtychoEngine::new(case.det, case.nprb).expect("engine");
        let (nz, n) = (case.u.dim().0, case.u.dim().1);
        let psi = Array3::from_elem(
            (case.theta.len(), nz, n),
            Complex64::from_polar(1.0, 0.8),
        );
        let ops = engine
            .bind(case.probe.view(), case.scan.view())
            .expect("bind");
        let farfield = engine.fwd(&ops, psi.view());

        group.bench_function(BenchmarkId::new("forward", &case.label), |b| {
            b.iter(|| black_box(engine.fwd(&ops, psi.view())))
        });
        group.bench_function(BenchmarkId::new("adjoint", &case.label), |b| {
            b.iter(|| black_box(engine.adj(&ops, farfield.view(), (nz, n))))
        });
    }

    group.finish();
}

fn bench_tv_pair(c: &mut Criterion) {
    use ptycho_math::tv::{divergence, gradient};

    let mut group = c.benchmark_group("tv_gradient_divergence");
    let u = slab_object(16, 64);
    let g = gradient(&u);

    group.bench_function("gradient_16x64x64", |b| b.iter(|| black_box(gradient(&u))));
    group.bench_function("divergence_16x64x64", |b| {
        b.iter(|| black_box(divergence(&g)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_radon_pair,
    bench_diffraction_pair,
    bench_tv_pair
);
criterion_main!(benches);
