// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Solver State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use ndarray::{Array3, Array4};
use num_complex::Complex64;

use crate::geometry::Geometry;

/// Complex phase of the constant wavefield seed.
const SEED_PHASE: f64 = 0.8;

/// Primal, consensus and dual variables of the joint reconstruction.
///
/// Allocated once before the outer loop, mutated in place every outer
/// iteration, never resized. `u` is the object (re = delta, im = beta);
/// `psi` the per-angle transmission functions; `h`/`lamd` the wavefield
/// consensus copy and its dual; `phi`/`mu` the TV consensus copy of
/// `gradient(u)` and its dual. `e` holds the most recent gradient of
/// `u` so the consensus step does not recompute it.
#[derive(Debug, Clone)]
pub struct AdmmState {
    pub u: Array3<Complex64>,
    pub psi: Array3<Complex64>,
    pub h: Array3<Complex64>,
    pub e: Array4<Complex64>,
    pub phi: Array4<Complex64>,
    pub lamd: Array3<Complex64>,
    pub mu: Array4<Complex64>,
}

impl AdmmState {
    /// Initial guess: wavefield-domain variables at the constant complex
    /// seed exp(i*0.8), everything else zero.
    pub fn seeded(geometry: &Geometry) -> Self {
        let (ntheta, nz, n) = geometry.tomo_shape();
        let obj = geometry.object_shape();
        let seed = Complex64::from_polar(1.0, SEED_PHASE);
        AdmmState {
            u: Array3::zeros(obj),
            psi: Array3::from_elem((ntheta, nz, n), seed),
            h: Array3::from_elem((ntheta, nz, n), seed),
            e: Array4::zeros((3, obj.0, obj.1, obj.2)),
            phi: Array4::zeros((3, obj.0, obj.1, obj.2)),
            lamd: Array3::zeros((ntheta, nz, n)),
            mu: Array4::zeros((3, obj.0, obj.1, obj.2)),
        }
    }
}

/// Output of the ADMM orchestrator.
#[derive(Debug, Clone)]
pub struct AdmmResult {
    /// Reconstructed object (re = delta, im = beta).
    pub u: Array3<Complex64>,
    /// Final ptychographic wavefield estimate.
    pub psi: Array3<Complex64>,
    /// Per-outer-iteration Lagrangian terms:
    /// [data fidelity, TV penalty, wavefield consensus, gradient consensus].
    pub lagrangian: Vec<[f64; 4]>,
    /// Per-outer-iteration primal residual ||psi - h||_2 (consensus
    /// mismatch); recorded for convergence monitoring, never used for
    /// early stopping.
    pub primal_residual: Vec<f64>,
}

impl AdmmResult {
    /// Total augmented-Lagrangian value per outer iteration.
    pub fn lagrangian_totals(&self) -> Vec<f64> {
        self.lagrangian.iter().map(|t| t.iter().sum()).collect()
    }
}
