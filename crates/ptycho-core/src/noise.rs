// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Noise / Data Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Measurement models: corruption of simulated intensities and the
//! matching likelihood gradients for the ptychography data term.
//!
//! The corruption model and the solver-side likelihood are selected
//! independently (a Poisson experiment solved with a Gaussian data term
//! is a legitimate configuration, not an error). All randomness flows
//! through a caller-supplied seeded RNG.

use ndarray::{Array4, ArrayView4};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use ptycho_types::config::NoiseModel;

/// Amplitude standard deviation for the Gaussian corruption model, in
/// sqrt-count units.
const GAUSSIAN_AMPLITUDE_SIGMA: f64 = 0.5;

/// Guard against division by vanishing far-field intensity in the
/// Poisson gradient.
const INTENSITY_EPS: f64 = 1e-32;

/// Corrupt clean intensities with the selected measurement model.
///
/// Poisson: integer photon counts drawn per pixel. Gaussian: additive
/// noise on amplitudes, re-squared and clamped at zero.
pub fn corrupt<R: Rng>(data: &Array4<f64>, model: NoiseModel, rng: &mut R) -> Array4<f64> {
    match model {
        NoiseModel::Poisson => data.mapv(|lam| {
            if lam <= 0.0 {
                0.0
            } else {
                Poisson::new(lam).expect("lambda > 0").sample(rng)
            }
        }),
        NoiseModel::Gaussian => {
            let normal = Normal::new(0.0, GAUSSIAN_AMPLITUDE_SIGMA).expect("sigma > 0");
            data.mapv(|v| {
                let amp = v.max(0.0).sqrt() + normal.sample(rng);
                amp.max(0.0).powi(2)
            })
        }
    }
}

/// Detector-plane gradient of the data-fidelity term with respect to
/// the far field, before back-propagation.
///
/// Gaussian (amplitude residual): g = F - sqrt(d) * F / |F|.
/// Poisson (count likelihood):    g = F * (1 - d / |F|^2).
///
/// `data` is in the same normalization as `|farfield|^2`.
pub fn likelihood_gradient(
    model: NoiseModel,
    farfield: &Array4<Complex64>,
    data: &ArrayView4<'_, f64>,
) -> Array4<Complex64> {
    debug_assert_eq!(farfield.dim(), data.dim());
    let mut out = farfield.clone();
    match model {
        NoiseModel::Gaussian => {
            for (g, &d) in out.iter_mut().zip(data.iter()) {
                let amp = g.norm();
                if amp > 0.0 {
                    *g -= *g * (d.max(0.0).sqrt() / amp);
                }
            }
        }
        NoiseModel::Poisson => {
            for (g, &d) in out.iter_mut().zip(data.iter()) {
                let intensity = g.norm_sqr().max(INTENSITY_EPS);
                *g *= 1.0 - d / intensity;
            }
        }
    }
    out
}

/// Data-fidelity value matching [`likelihood_gradient`], for the
/// Lagrangian diagnostic.
pub fn data_fidelity(model: NoiseModel, farfield: &Array4<Complex64>, data: &ArrayView4<'_, f64>) -> f64 {
    match model {
        NoiseModel::Gaussian => farfield
            .iter()
            .zip(data.iter())
            .map(|(f, &d)| {
                let r = f.norm() - d.max(0.0).sqrt();
                0.5 * r * r
            })
            .sum(),
        NoiseModel::Poisson => farfield
            .iter()
            .zip(data.iter())
            .map(|(f, &d)| {
                let intensity = f.norm_sqr().max(INTENSITY_EPS);
                intensity - d * intensity.ln()
            })
            .sum(),
    }
}
