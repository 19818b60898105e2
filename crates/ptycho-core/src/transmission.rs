// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Beer-Lambert Transmission Map
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Exponential transmission map between tomographic projections and
//! per-angle wavefields, and its logarithmic inverse.
//!
//! psi = exp(i * k * voxelsize * proj). The real part of a projection
//! (delta, phase) rotates the wavefield phase; the imaginary part
//! (beta, absorption) attenuates its amplitude. For purely real
//! projections |psi| == 1 everywhere.

use ndarray::Array3;
use num_complex::Complex64;

/// Elementwise Beer-Lambert transmission, angle-local.
pub fn exptomo(proj: &Array3<Complex64>, voxelsize: f64, wavenumber: f64) -> Array3<Complex64> {
    let scale = Complex64::new(0.0, wavenumber * voxelsize);
    proj.mapv(|p| (scale * p).exp())
}

/// Inverse of [`exptomo`]: proj = -i * ln(psi) / (k * voxelsize).
///
/// Uses the principal branch of the complex logarithm; phases beyond
/// +-pi wrap, so this is only the exact inverse while the accumulated
/// phase stays inside one branch (true for the weakly scattering
/// objects this engine targets).
pub fn logtomo(psi: &Array3<Complex64>, voxelsize: f64, wavenumber: f64) -> Array3<Complex64> {
    let scale = Complex64::new(0.0, -1.0 / (wavenumber * voxelsize));
    psi.mapv(|p| scale * p.ln())
}
