// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Synthetic Experiment Factories
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Pure factories for synthetic objects, probes, angles and scan
//! tables, plus the batched forward simulation of detector data.
//!
//! Everything is side-effect free; randomness (scan jitter, noise) is
//! drawn from a caller-supplied seeded RNG so experiments reproduce
//! bit-exactly.

use ndarray::{s, Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use rand::Rng;
use ptycho_types::error::PtychoResult;
use ptycho_types::geometry::Geometry;

use crate::batch::{angle_batches, ensure_batch_fits};
use crate::ptycho::{validate_scan, PtychoEngine};
use crate::tomo::forward_tomo;
use crate::transmission::exptomo;

/// Refractive-index decrement of the phase slab.
pub const SLAB_DELTA: f64 = 1e-6;

/// Absorption index of the absorbing slab.
pub const SLAB_BETA: f64 = 2e-8;

/// Circular probe with peak intensity `maxint` and a one-pixel soft
/// edge. Radius is half the probe side.
pub fn disk_probe(nprb: usize, maxint: f64) -> Array2<Complex64> {
    let c = (nprb as f64 - 1.0) / 2.0;
    let radius = nprb as f64 / 2.0;
    let amp = maxint.sqrt();
    Array2::from_shape_fn((nprb, nprb), |(i, j)| {
        let r = ((i as f64 - c).powi(2) + (j as f64 - c).powi(2)).sqrt();
        let w = (radius + 0.5 - r).clamp(0.0, 1.0);
        Complex64::new(amp * w, 0.0)
    })
}

/// Ground-truth object: two rectangular slabs, one purely phase-shifting
/// (delta, real part) and one purely absorbing (beta, imaginary part).
pub fn slab_object(nz: usize, n: usize) -> Array3<Complex64> {
    let mut u = Array3::zeros((nz, n, n));
    // Phase slab in the upper half of the volume.
    for z in nz / 4..nz / 2 {
        for y in n / 4..3 * n / 4 {
            for x in n / 4..n / 2 {
                u[[z, y, x]] = Complex64::new(SLAB_DELTA, 0.0);
            }
        }
    }
    // Absorbing slab in the lower half, offset in-plane.
    for z in nz / 2..3 * nz / 4 {
        for y in n / 4..n / 2 {
            for x in n / 2..3 * n / 4 {
                u[[z, y, x]] += Complex64::new(0.0, SLAB_BETA);
            }
        }
    }
    u
}

/// `ntheta` angles uniformly covering `[0, pi)`.
pub fn uniform_angles(ntheta: usize) -> Array1<f64> {
    Array1::from_shape_fn(ntheta, |i| i as f64 * std::f64::consts::PI / ntheta as f64)
}

/// Raster scan table with per-position jitter of up to one pixel,
/// `[ntheta, nscan, 2]` (row, col) patch corners.
///
/// Rows step by `shift` over `[0, nz - nprb]`, columns likewise over
/// `[0, n - nprb]`; jittered positions are clamped back in bounds so a
/// generated table always validates.
pub fn jittered_scan<R: Rng>(
    ntheta: usize,
    frame: (usize, usize),
    shift: usize,
    nprb: usize,
    rng: &mut R,
) -> Array3<f64> {
    let (nz, n) = frame;
    assert!(nprb <= nz && nprb <= n, "probe must fit the frame");
    assert!(shift >= 1);

    let rows: Vec<usize> = (0..=(nz - nprb)).step_by(shift).collect();
    let cols: Vec<usize> = (0..=(n - nprb)).step_by(shift).collect();
    let nscan = rows.len() * cols.len();

    let mut scan = Array3::zeros((ntheta, nscan, 2));
    for a in 0..ntheta {
        for (ip, (&ry, &cx)) in rows
            .iter()
            .flat_map(|r| cols.iter().map(move |c| (r, c)))
            .enumerate()
        {
            let jy = rng.gen_range(-1i64..=1);
            let jx = rng.gen_range(-1i64..=1);
            let y = (ry as i64 + jy).clamp(0, (nz - nprb) as i64);
            let x = (cx as i64 + jx).clamp(0, (n - nprb) as i64);
            scan[[a, ip, 0]] = y as f64;
            scan[[a, ip, 1]] = x as f64;
        }
    }
    scan
}

/// Batched forward simulation of clean detector intensities:
/// object -> projections -> wavefields -> far-field intensities,
/// normalized by the engine's detector coefficient.
///
/// Returns the intensities together with the simulated wavefield
/// ensemble (the driver keeps the latter as the reference transmission
/// functions).
pub fn simulate_intensities(
    engine: &PtychoEngine,
    geometry: &Geometry,
    u: &Array3<Complex64>,
    probe: &Array2<Complex64>,
    scan: &Array3<f64>,
    theta: &Array1<f64>,
    ptheta: usize,
) -> PtychoResult<(Array4<f64>, Array3<Complex64>)> {
    validate_scan(scan.view(), (geometry.nz, geometry.n), geometry.nprb)?;
    let psi = exptomo(
        &forward_tomo(u, theta),
        geometry.voxelsize,
        geometry.wavenumber(),
    );
    let coef = engine.detector_coef(probe.view());
    let (ntheta, nscan, d0, d1) = geometry.data_shape();
    let mut data = Array4::zeros((ntheta, nscan, d0, d1));

    for (bi, range) in angle_batches(ntheta, ptheta)?.into_iter().enumerate() {
        ensure_batch_fits(bi, range.len(), nscan, geometry.det)?;
        // Operands are bound for exactly one batch and released with it.
        let ops = engine.bind(probe.view(), scan.slice(s![range.clone(), .., ..]))?;
        let farfield = engine.fwd(&ops, psi.slice(s![range.clone(), .., ..]));
        data.slice_mut(s![range, .., .., ..])
            .assign(&farfield.mapv(|c| c.norm_sqr() / coef));
    }
    Ok((data, psi))
}
