// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Experiment Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Config-driven assembly of a full experiment: probe, scan table and
//! angle grid from [`ExperimentConfig`], simulated (optionally noisy)
//! detector data for a given ground-truth object, and the matching
//! solver run. One RNG, seeded from the config, drives scan jitter and
//! noise in that order, so an experiment reproduces bit-exactly.

use ndarray::{Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

use ptycho_types::config::ExperimentConfig;
use ptycho_types::error::{PtychoError, PtychoResult};
use ptycho_types::geometry::Geometry;
use ptycho_types::state::{AdmmResult, AdmmState};

use crate::noise::corrupt;
use crate::ptycho::PtychoEngine;
use crate::simulate::{disk_probe, jittered_scan, simulate_intensities, uniform_angles};
use crate::solver::{PtychoTomoSolver, SolverOptions};

/// A fully assembled experiment: acquisition geometry, operands and the
/// (simulated) measured data for one ground-truth object.
pub struct Experiment {
    config: ExperimentConfig,
    geometry: Geometry,
    probe: Array2<Complex64>,
    scan: Array3<f64>,
    theta: Array1<f64>,
    data: Array4<f64>,
    /// Reference transmission functions of the ground truth.
    psi_true: Array3<Complex64>,
}

impl Experiment {
    /// Assemble geometry and operands from the config, then simulate
    /// detector data for `u`. The object fixes `nz` and `n`; everything
    /// else comes from the config.
    pub fn from_config(config: &ExperimentConfig, u: &Array3<Complex64>) -> PtychoResult<Self> {
        config.validate()?;
        let (nz, ny, nx) = u.dim();
        if ny != nx {
            return Err(PtychoError::ConfigError(format!(
                "object must be square in-plane, got {ny}x{nx}"
            )));
        }
        let n = nx;
        if config.probe_size > nz || config.probe_size > n {
            return Err(PtychoError::ConfigError(format!(
                "probe {}px exceeds projected frame {nz}x{n}",
                config.probe_size
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let scan = jittered_scan(
            config.angle_count,
            (nz, n),
            config.probe_shift,
            config.probe_size,
            &mut rng,
        );
        let geometry = Geometry {
            ntheta: config.angle_count,
            nz,
            n,
            nscan: scan.dim().1,
            nprb: config.probe_size,
            det: config.detector_size,
            voxelsize: config.voxelsize,
            energy: config.energy,
        };
        geometry.validate()?;

        let probe = disk_probe(config.probe_size, config.maxint);
        let theta = uniform_angles(config.angle_count);
        let engine = PtychoEngine::new(geometry.det, geometry.nprb)?;
        let (mut data, psi_true) =
            simulate_intensities(&engine, &geometry, u, &probe, &scan, &theta, config.ptheta)?;
        if config.noise {
            data = corrupt(&data, config.sim_model, &mut rng);
        }

        Ok(Experiment {
            config: config.clone(),
            geometry,
            probe,
            scan,
            theta,
            data,
            psi_true,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn psi_true(&self) -> &Array3<Complex64> {
        &self.psi_true
    }

    /// Solver hyper-parameters from the config; consensus weights keep
    /// their defaults.
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            alpha: self.config.alpha,
            piter: self.config.piter,
            titer: self.config.titer,
            niter: self.config.niter,
            model: self.config.solver_model,
            ..SolverOptions::default()
        }
    }

    /// Run the full reconstruction from the seeded initial state.
    pub fn reconstruct(&self) -> PtychoResult<AdmmResult> {
        let solver = PtychoTomoSolver::new(
            self.geometry,
            self.probe.clone(),
            self.scan.clone(),
            self.theta.clone(),
            self.config.ptheta,
        )?;
        let mut state = AdmmState::seeded(&self.geometry);
        solver.admm(&self.data, &mut state, &self.solver_options())
    }
}
