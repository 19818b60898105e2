// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Tomographic Projection Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Discrete Radon projection and its exact transpose.
//!
//! The volume is `[nz, n, n]` with the rotation axis along `nz`; each
//! z-slice is projected independently. Rays are marched through the
//! slice with unit (one voxel) step length and bilinear interpolation
//! about the slice centre, so projections are in voxel-length units;
//! the physical path length enters later through the transmission map.
//!
//! `adjoint_tomo` scatters with the same interpolation weights the
//! forward march gathers with, which makes the pair exact adjoints up
//! to floating-point roundoff. The tomography sub-solve's normal
//! equations depend on that.

use ndarray::{Array1, Array3};
use num_complex::Complex64;

/// Bilinear footprint of one ray sample: up to four (row, col, weight)
/// corners inside the slice.
#[inline]
fn corners(y: f64, x: f64, n: usize) -> [(usize, usize, f64); 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let wx = x - x0;
    let wy = y - y0;

    let mut out = [(0usize, 0usize, 0.0f64); 4];
    let mut idx = 0;
    for (dy, dx, w) in [
        (0.0, 0.0, (1.0 - wy) * (1.0 - wx)),
        (0.0, 1.0, (1.0 - wy) * wx),
        (1.0, 0.0, wy * (1.0 - wx)),
        (1.0, 1.0, wy * wx),
    ] {
        let yy = y0 + dy;
        let xx = x0 + dx;
        if yy >= 0.0 && xx >= 0.0 && yy < n as f64 && xx < n as f64 && w > 0.0 {
            out[idx] = (yy as usize, xx as usize, w);
            idx += 1;
        }
    }
    // Unused entries keep weight 0.0 and are skipped by callers.
    out
}

/// Ray-sample position for detector bin `s`, march step `m`, angle `t`.
#[inline]
fn sample_point(s: usize, m: usize, theta: f64, n: usize) -> (f64, f64) {
    let c = (n as f64 - 1.0) / 2.0;
    let (sin_t, cos_t) = theta.sin_cos();
    // Detector axis is perpendicular to the ray direction.
    let ds = s as f64 - c;
    let dm = m as f64 - c;
    let x = c + ds * -sin_t + dm * cos_t;
    let y = c + ds * cos_t + dm * sin_t;
    (y, x)
}

/// Forward Radon projection: `[nz, n, n] -> [ntheta, nz, n]`.
pub fn forward_tomo(u: &Array3<Complex64>, theta: &Array1<f64>) -> Array3<Complex64> {
    let (nz, ny, nx) = u.dim();
    debug_assert_eq!(ny, nx, "object slices must be square");
    let n = nx;
    let ntheta = theta.len();
    let mut proj = Array3::zeros((ntheta, nz, n));

    for (a, &t) in theta.iter().enumerate() {
        for s in 0..n {
            for m in 0..n {
                let (y, x) = sample_point(s, m, t, n);
                for &(yy, xx, w) in &corners(y, x, n) {
                    if w == 0.0 {
                        continue;
                    }
                    for z in 0..nz {
                        proj[[a, z, s]] += u[[z, yy, xx]] * w;
                    }
                }
            }
        }
    }
    proj
}

/// Back-projection, the exact transpose of [`forward_tomo`]:
/// `[ntheta, nz, n] -> [nz, n, n]`.
pub fn adjoint_tomo(proj: &Array3<Complex64>, theta: &Array1<f64>, n: usize) -> Array3<Complex64> {
    let (ntheta, nz, ns) = proj.dim();
    debug_assert_eq!(ns, n);
    debug_assert_eq!(ntheta, theta.len());
    let mut u = Array3::zeros((nz, n, n));

    for (a, &t) in theta.iter().enumerate() {
        for s in 0..n {
            for m in 0..n {
                let (y, x) = sample_point(s, m, t, n);
                for &(yy, xx, w) in &corners(y, x, n) {
                    if w == 0.0 {
                        continue;
                    }
                    for z in 0..nz {
                        u[[z, yy, xx]] += proj[[a, z, s]] * w;
                    }
                }
            }
        }
    }
    u
}
