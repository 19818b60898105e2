// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — ADMM Orchestrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Alternating-direction solver coupling the ptychography and
//! tomography sub-problems through consensus variables.
//!
//! Joint problem: minimize the detector data term over (u, psi) subject
//! to psi = exptomo(R u) and phi = grad(u), with an isotropic TV
//! penalty alpha*|phi|_1. Each outer iteration runs
//!   1. a batched gradient sub-solve for psi (data term + wavefield
//!      consensus, `piter` steps per batch),
//!   2. a conjugate-gradient sub-solve for u on the linearized normal
//!      equations (`titer` steps),
//!   3. the consensus recomputation h = exptomo(R u) and the TV
//!      proximal step for phi,
//!   4. dual ascent on lamd and mu,
//!   5. the Lagrangian / primal-residual diagnostic,
//!   6. residual balancing of the consensus weights: a penalty doubles
//!      when its primal residual dominates the dual residual by 10x and
//!      halves in the opposite case, so the data term and the consensus
//!      pull stay commensurate however the probe power scales.
//! The loop always runs exactly `niter` iterations; divergence (NaN or
//! Inf in a primal variable) aborts with the iteration index and the
//! variable name.

use ndarray::{s, Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use std::ops::Range;

use ptycho_math::tv::{divergence, gradient, shrink, tv_norm};
use ptycho_types::config::NoiseModel;
use ptycho_types::error::{PtychoError, PtychoResult};
use ptycho_types::geometry::Geometry;
use ptycho_types::state::{AdmmResult, AdmmState};

use crate::batch::{angle_batches, ensure_batch_fits};
use crate::noise::{data_fidelity, likelihood_gradient};
use crate::ptycho::{validate_scan, PtychoEngine};
use crate::tomo::{adjoint_tomo, forward_tomo};
use crate::transmission::{exptomo, logtomo};

/// Reconstruction hyper-parameters for one `admm` call.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// TV regularization weight.
    pub alpha: f64,
    /// Inner ptychography iterations per batch per outer step.
    pub piter: usize,
    /// Inner tomography (CG) iterations per outer step.
    pub titer: usize,
    /// Outer ADMM iterations.
    pub niter: usize,
    /// Likelihood model of the ptychography data term. Independent of
    /// whatever model corrupted the data.
    pub model: NoiseModel,
    /// Initial wavefield consensus weight (rho_1); adapted per outer
    /// iteration by residual balancing.
    pub rho: f64,
    /// Initial gradient consensus weight (rho_2); adapted likewise.
    pub rho_tv: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            alpha: 3e-7,
            piter: 4,
            titer: 4,
            niter: 300,
            model: NoiseModel::Poisson,
            rho: 0.5,
            rho_tv: 0.5,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> PtychoResult<()> {
        if self.piter == 0 || self.titer == 0 || self.niter == 0 {
            return Err(PtychoError::ConfigError(
                "piter, titer and niter must all be >= 1".to_string(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(PtychoError::ConfigError(
                "alpha must be finite and >= 0".to_string(),
            ));
        }
        if !self.rho.is_finite() || self.rho <= 0.0 || !self.rho_tv.is_finite() || self.rho_tv <= 0.0 {
            return Err(PtychoError::ConfigError(
                "rho and rho_tv must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The reconstruction engine: owns geometry, operands and the angle
/// partition; all solver-scale state lives in [`AdmmState`].
pub struct PtychoTomoSolver {
    geometry: Geometry,
    engine: PtychoEngine,
    probe: Array2<Complex64>,
    scan: Array3<f64>,
    theta: Array1<f64>,
    batches: Vec<Range<usize>>,
    coef: f64,
    /// Spectral bound of the ptychography normal operator: the maximal
    /// summed probe power over overlapping footprints. Sets the
    /// gradient step of the psi sub-solve.
    overlap_bound: f64,
}

impl PtychoTomoSolver {
    /// Validates the full configuration before any solver-scale
    /// allocation; every incompatibility reported here is fatal.
    pub fn new(
        geometry: Geometry,
        probe: Array2<Complex64>,
        scan: Array3<f64>,
        theta: Array1<f64>,
        ptheta: usize,
    ) -> PtychoResult<Self> {
        geometry.validate()?;
        let (ntheta, nz, n) = geometry.tomo_shape();
        if theta.len() != ntheta {
            return Err(PtychoError::ConfigError(format!(
                "angle table has {} entries, geometry expects {}",
                theta.len(),
                ntheta
            )));
        }
        if probe.dim() != (geometry.nprb, geometry.nprb) {
            return Err(PtychoError::ConfigError(format!(
                "probe shape {:?} does not match geometry probe size {}",
                probe.dim(),
                geometry.nprb
            )));
        }
        if scan.dim() != (ntheta, geometry.nscan, 2) {
            return Err(PtychoError::ConfigError(format!(
                "scan table shape {:?} does not match geometry {:?}",
                scan.dim(),
                (ntheta, geometry.nscan, 2)
            )));
        }
        validate_scan(scan.view(), (nz, n), geometry.nprb)?;

        let batches = angle_batches(ntheta, ptheta)?;
        let engine = PtychoEngine::new(geometry.det, geometry.nprb)?;
        let coef = engine.detector_coef(probe.view());

        // Maximal overlap of probe power over any wavefield pixel, over
        // all angles: bounds the Hessian of the ptychography data term.
        let mut overlap_bound: f64 = 0.0;
        let mut overlap = Array2::<f64>::zeros((nz, n));
        for a in 0..ntheta {
            overlap.fill(0.0);
            for p in 0..geometry.nscan {
                let iy = scan[[a, p, 0]].round() as usize;
                let ix = scan[[a, p, 1]].round() as usize;
                for py in 0..geometry.nprb {
                    for px in 0..geometry.nprb {
                        overlap[[iy + py, ix + px]] += probe[[py, px]].norm_sqr();
                    }
                }
            }
            overlap_bound = overlap.iter().fold(overlap_bound, |m, &v| m.max(v));
        }
        if overlap_bound <= 0.0 {
            return Err(PtychoError::ConfigError(
                "probe carries no power; nothing to reconstruct".to_string(),
            ));
        }

        Ok(PtychoTomoSolver {
            geometry,
            engine,
            probe,
            scan,
            theta,
            batches,
            coef,
            overlap_bound,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Detector normalization coefficient (intensities are
    /// |far field|^2 / coef).
    pub fn detector_coef(&self) -> f64 {
        self.coef
    }

    /// Tomographic projection with the solver's angle table.
    pub fn fwd_tomo(&self, u: &Array3<Complex64>) -> Array3<Complex64> {
        forward_tomo(u, &self.theta)
    }

    /// Transmission map with the solver's physical constants.
    pub fn exptomo(&self, proj: &Array3<Complex64>) -> Array3<Complex64> {
        exptomo(proj, self.geometry.voxelsize, self.geometry.wavenumber())
    }

    // ───────────────────── ptychography sub-solve ─────────────────────

    /// `piter` gradient iterations per batch on the ptychography data
    /// term plus the wavefield consensus penalty. `rho` is the current
    /// (balanced) consensus weight. Returns the final data-fidelity
    /// value for the Lagrangian diagnostic.
    fn grad_ptycho(
        &self,
        data: &Array4<f64>,
        psi: &mut Array3<Complex64>,
        h: &Array3<Complex64>,
        lamd: &Array3<Complex64>,
        rho: f64,
        opts: &SolverOptions,
    ) -> PtychoResult<f64> {
        let (_, nz, n) = self.geometry.tomo_shape();
        let gamma = 1.0 / (self.overlap_bound + rho);
        let mut fidelity = 0.0;

        for (bi, range) in self.batches.iter().enumerate() {
            ensure_batch_fits(bi, range.len(), self.geometry.nscan, self.geometry.det)?;
            let ops = self
                .engine
                .bind(self.probe.view(), self.scan.slice(s![range.clone(), .., ..]))?;
            let data_b = data.slice(s![range.clone(), .., .., ..]);
            let mut psi_b = psi.slice(s![range.clone(), .., ..]).to_owned();

            // Consensus target for this batch: h - lamd / rho.
            let mut target = h.slice(s![range.clone(), .., ..]).to_owned();
            for (t, &l) in target.iter_mut().zip(lamd.slice(s![range.clone(), .., ..]).iter()) {
                *t -= l / rho;
            }

            for _ in 0..opts.piter {
                let farfield = self.engine.fwd(&ops, psi_b.view());
                let residual = likelihood_gradient(opts.model, &farfield, &data_b);
                let mut grad = self.engine.adj(&ops, residual.view(), (nz, n));
                for ((g, &p), &t) in grad.iter_mut().zip(psi_b.iter()).zip(target.iter()) {
                    *g += (p - t) * rho;
                }
                for (p, &g) in psi_b.iter_mut().zip(grad.iter()) {
                    *p -= g * gamma;
                }
            }

            let farfield = self.engine.fwd(&ops, psi_b.view());
            fidelity += data_fidelity(opts.model, &farfield, &data_b);
            psi.slice_mut(s![range.clone(), .., ..]).assign(&psi_b);
        }
        Ok(fidelity)
    }

    // ────────────────────── tomography sub-solve ──────────────────────

    /// Normal operator of the tomography sub-problem:
    /// A(u) = R^T R u - eta * div(grad(u)).
    fn tomo_normal_op(&self, u: &Array3<Complex64>, eta: f64) -> Array3<Complex64> {
        let n = self.geometry.n;
        let mut out = adjoint_tomo(&forward_tomo(u, &self.theta), &self.theta, n);
        let reg = divergence(&gradient(u));
        for (o, &r) in out.iter_mut().zip(reg.iter()) {
            *o -= r * eta;
        }
        out
    }

    /// `titer` conjugate-gradient iterations on
    /// ||R u - xi0||^2 + eta ||grad(u) - xi1||^2.
    fn cg_tomo(
        &self,
        xi0: &Array3<Complex64>,
        xi1: &Array4<Complex64>,
        u: &mut Array3<Complex64>,
        titer: usize,
        eta: f64,
    ) {
        let n = self.geometry.n;

        // b = R^T xi0 - eta * div(xi1)
        let mut b = adjoint_tomo(xi0, &self.theta, n);
        let div_xi1 = divergence(xi1);
        for (bv, &d) in b.iter_mut().zip(div_xi1.iter()) {
            *bv -= d * eta;
        }

        let au = self.tomo_normal_op(u, eta);
        let mut r = b;
        for (rv, &a) in r.iter_mut().zip(au.iter()) {
            *rv -= a;
        }
        let mut p = r.clone();
        let mut rs_old: f64 = r.iter().map(|c| c.norm_sqr()).sum();

        for _ in 0..titer {
            if rs_old <= f64::EPSILON {
                break;
            }
            let ap = self.tomo_normal_op(&p, eta);
            let denom: f64 = p
                .iter()
                .zip(ap.iter())
                .map(|(pc, ac)| (pc.conj() * ac).re)
                .sum();
            if denom <= 0.0 {
                break;
            }
            let alpha = rs_old / denom;
            for (uv, &pc) in u.iter_mut().zip(p.iter()) {
                *uv += pc * alpha;
            }
            for (rv, &ac) in r.iter_mut().zip(ap.iter()) {
                *rv -= ac * alpha;
            }
            let rs_new: f64 = r.iter().map(|c| c.norm_sqr()).sum();
            let beta = rs_new / rs_old;
            for (pc, &rv) in p.iter_mut().zip(r.iter()) {
                *pc = rv + *pc * beta;
            }
            rs_old = rs_new;
        }
    }

    // ─────────────────────────── outer loop ───────────────────────────

    /// Run the full alternating-direction reconstruction.
    ///
    /// `data` holds measured intensities `[ntheta, nscan, det0, det1]`
    /// in detector-coefficient normalization (as produced by the
    /// simulation path). `state` is mutated in place; the returned
    /// result clones the final primal variables and carries the
    /// per-iteration diagnostics.
    pub fn admm(
        &self,
        data: &Array4<f64>,
        state: &mut AdmmState,
        opts: &SolverOptions,
    ) -> PtychoResult<AdmmResult> {
        opts.validate()?;
        if data.dim() != self.geometry.data_shape() {
            return Err(PtychoError::ConfigError(format!(
                "data shape {:?} does not match geometry {:?}",
                data.dim(),
                self.geometry.data_shape()
            )));
        }

        let voxelsize = self.geometry.voxelsize;
        let wavenumber = self.geometry.wavenumber();
        let mut rho = opts.rho;
        let mut rho_tv = opts.rho_tv;

        // Bring measured intensities into |far field|^2 scale once.
        let data_scaled = data.mapv(|d| d * self.coef);

        let mut lagrangian = Vec::with_capacity(opts.niter);
        let mut primal_residual = Vec::with_capacity(opts.niter);

        for iteration in 0..opts.niter {
            // 1. Ptychography sub-solve (batched).
            let fidelity =
                self.grad_ptycho(&data_scaled, &mut state.psi, &state.h, &state.lamd, rho, opts)?;
            check_finite(state.psi.iter(), "psi", iteration)?;

            // 2. Tomography sub-solve on the linearized targets.
            let eta = rho_tv / rho;
            let mut coupled = state.psi.clone();
            for (c, &l) in coupled.iter_mut().zip(state.lamd.iter()) {
                *c += l / rho;
            }
            let xi0 = logtomo(&coupled, voxelsize, wavenumber);
            let mut xi1 = state.phi.clone();
            for (x, &m) in xi1.iter_mut().zip(state.mu.iter()) {
                *x -= m / rho_tv;
            }
            self.cg_tomo(&xi0, &xi1, &mut state.u, opts.titer, eta);
            check_finite(state.u.iter(), "u", iteration)?;

            // 3. Consensus updates. The previous consensus copies feed
            //    the dual residuals of the balancing step.
            let h_prev = state.h.clone();
            let phi_prev = state.phi.clone();
            state.e = gradient(&state.u);
            state.h = self.exptomo(&self.fwd_tomo(&state.u));
            let mut phi_raw = state.e.clone();
            for (p, &m) in phi_raw.iter_mut().zip(state.mu.iter()) {
                *p += m / rho_tv;
            }
            state.phi = shrink(&phi_raw, opts.alpha / rho_tv);

            // 4. Dual ascent.
            let mut consensus_sq = 0.0;
            let mut consensus_cross = 0.0;
            for ((l, &p), &hh) in state
                .lamd
                .iter_mut()
                .zip(state.psi.iter())
                .zip(state.h.iter())
            {
                let diff = p - hh;
                *l += diff * rho;
                consensus_sq += diff.norm_sqr();
                consensus_cross += (l.conj() * diff).re;
            }
            let mut tv_sq = 0.0;
            let mut tv_cross = 0.0;
            for ((m, &e), &ph) in state.mu.iter_mut().zip(state.e.iter()).zip(state.phi.iter())
            {
                let diff = e - ph;
                *m += diff * rho_tv;
                tv_sq += diff.norm_sqr();
                tv_cross += (m.conj() * diff).re;
            }

            // 5. Diagnostics; never a stopping rule.
            lagrangian.push([
                fidelity,
                opts.alpha * tv_norm(&state.e),
                2.0 * consensus_cross + rho * consensus_sq,
                2.0 * tv_cross + rho_tv * tv_sq,
            ]);
            primal_residual.push(consensus_sq.sqrt());

            // 6. Residual balancing. The dual residual of each
            //    constraint is the weighted movement of its consensus
            //    copy between outer iterations.
            let h_moved: f64 = state
                .h
                .iter()
                .zip(h_prev.iter())
                .map(|(a, b)| (a - b).norm_sqr())
                .sum();
            rho = balance_penalty(rho, consensus_sq, rho * rho * h_moved);
            let phi_moved: f64 = state
                .phi
                .iter()
                .zip(phi_prev.iter())
                .map(|(a, b)| (a - b).norm_sqr())
                .sum();
            rho_tv = balance_penalty(rho_tv, tv_sq, rho_tv * rho_tv * phi_moved);
        }

        Ok(AdmmResult {
            u: state.u.clone(),
            psi: state.psi.clone(),
            lagrangian,
            primal_residual,
        })
    }
}

/// Residual balancing for one consensus weight: double when the primal
/// residual dominates the dual residual tenfold, halve in the opposite
/// case, hold inside the band. Keeps either side of the constraint from
/// freezing the other.
fn balance_penalty(penalty: f64, primal_sq: f64, dual_sq: f64) -> f64 {
    if primal_sq > 10.0 * dual_sq {
        penalty * 2.0
    } else if dual_sq > 10.0 * primal_sq {
        penalty * 0.5
    } else {
        penalty
    }
}

/// Divergence guard: the first non-finite entry aborts the loop with
/// the iteration index and variable name.
fn check_finite<'a, I>(values: I, variable: &'static str, iteration: usize) -> PtychoResult<()>
where
    I: IntoIterator<Item = &'a Complex64>,
{
    for v in values {
        if !v.re.is_finite() || !v.im.is_finite() {
            return Err(PtychoError::SolverDiverged {
                iteration,
                variable,
            });
        }
    }
    Ok(())
}
