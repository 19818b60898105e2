// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::error::{PtychoError, PtychoResult};

/// Measurement/likelihood model.
///
/// Used in two independent places: to corrupt simulated intensities and
/// to select the data-term gradient inside the ptychography sub-solve.
/// The two choices are deliberately decoupled; mixing them (e.g. Poisson
/// corruption with a Gaussian solver gradient) is a valid experimental
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseModel {
    #[default]
    Poisson,
    Gaussian,
}

/// Top-level experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Object voxel size [m].
    pub voxelsize: f64,
    /// X-ray energy [keV]; sets the wavenumber of the transmission map.
    pub energy: f64,
    /// Maximal probe intensity (peak of |probe|^2).
    pub maxint: f64,
    /// Probe side length [px].
    pub probe_size: usize,
    /// Probe step between neighbouring scan positions [px]
    /// (overlap fraction = (probe_size - probe_shift) / probe_size).
    pub probe_shift: usize,
    /// Detector dimensions [rows, cols].
    pub detector_size: [usize; 2],
    /// Number of rotation angles over [0, pi).
    pub angle_count: usize,
    /// Whether to corrupt simulated data at all.
    #[serde(default)]
    pub noise: bool,
    /// Model used to corrupt simulated intensities.
    #[serde(default)]
    pub sim_model: NoiseModel,
    /// Likelihood model used by the ptychography sub-solve.
    #[serde(default)]
    pub solver_model: NoiseModel,
    /// TV regularization weight.
    pub alpha: f64,
    /// Inner ptychography iterations per outer step.
    #[serde(default = "default_inner_iters")]
    pub piter: usize,
    /// Inner tomography iterations per outer step.
    #[serde(default = "default_inner_iters")]
    pub titer: usize,
    /// Outer ADMM iterations (the loop always runs exactly this many).
    pub niter: usize,
    /// Number of angular partitions processed per ptychography pass.
    pub ptheta: usize,
    /// RNG seed for noise corruption and scan jitter.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_inner_iters() -> usize {
    4
}

fn default_seed() -> u64 {
    42
}

impl ExperimentConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> PtychoResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation, run before any solver allocation.
    pub fn validate(&self) -> PtychoResult<()> {
        if !self.voxelsize.is_finite() || self.voxelsize <= 0.0 {
            return Err(PtychoError::ConfigError(
                "voxelsize must be finite and > 0".to_string(),
            ));
        }
        if !self.energy.is_finite() || self.energy <= 0.0 {
            return Err(PtychoError::ConfigError(
                "energy must be finite and > 0 [keV]".to_string(),
            ));
        }
        if !self.maxint.is_finite() || self.maxint <= 0.0 {
            return Err(PtychoError::ConfigError(
                "maxint must be finite and > 0".to_string(),
            ));
        }
        if self.probe_size == 0 {
            return Err(PtychoError::ConfigError(
                "probe_size must be >= 1".to_string(),
            ));
        }
        if self.probe_shift == 0 || self.probe_shift > self.probe_size {
            return Err(PtychoError::ConfigError(
                "probe_shift must be in [1, probe_size]".to_string(),
            ));
        }
        if self.detector_size[0] < self.probe_size || self.detector_size[1] < self.probe_size {
            return Err(PtychoError::ConfigError(format!(
                "detector {}x{} smaller than probe {}",
                self.detector_size[0], self.detector_size[1], self.probe_size
            )));
        }
        if self.angle_count == 0 {
            return Err(PtychoError::ConfigError(
                "angle_count must be >= 1".to_string(),
            ));
        }
        if self.ptheta == 0 || self.ptheta > self.angle_count {
            return Err(PtychoError::ConfigError(
                "ptheta must be in [1, angle_count]".to_string(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(PtychoError::ConfigError(
                "alpha must be finite and >= 0".to_string(),
            ));
        }
        if self.piter == 0 || self.titer == 0 || self.niter == 0 {
            return Err(PtychoError::ConfigError(
                "piter, titer and niter must all be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
