// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Geometry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{PtychoError, PtychoResult};

/// Combined acquisition geometry, fixed for a solver instance.
///
/// The object volume is `[nz, n, n]` (rotation axis along `nz`), its
/// tomographic projections are `[ntheta, nz, n]`, and each projected
/// frame `[nz, n]` is raster-scanned with `nscan` probe positions whose
/// exit waves land on a `[det0, det1]` detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Number of rotation angles.
    pub ntheta: usize,
    /// Object depth along the rotation axis.
    pub nz: usize,
    /// Object in-plane side length.
    pub n: usize,
    /// Scan positions per angle.
    pub nscan: usize,
    /// Probe side length [px].
    pub nprb: usize,
    /// Detector dimensions [rows, cols].
    pub det: [usize; 2],
    /// Object voxel size [m].
    pub voxelsize: f64,
    /// X-ray energy [keV].
    pub energy: f64,
}

impl Geometry {
    /// Photon wavelength [m] for the configured energy.
    pub fn wavelength(&self) -> f64 {
        1.24e-9 / self.energy
    }

    /// Wavenumber k = 2*pi/lambda [1/m] of the transmission map.
    pub fn wavenumber(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.wavelength()
    }

    /// Shape of the projection / wavefield ensemble.
    pub fn tomo_shape(&self) -> (usize, usize, usize) {
        (self.ntheta, self.nz, self.n)
    }

    /// Shape of the object volume.
    pub fn object_shape(&self) -> (usize, usize, usize) {
        (self.nz, self.n, self.n)
    }

    /// Shape of the measured-intensity ensemble.
    pub fn data_shape(&self) -> (usize, usize, usize, usize) {
        (self.ntheta, self.nscan, self.det[0], self.det[1])
    }

    /// Geometry-level compatibility checks, run before any solver-scale
    /// allocation.
    pub fn validate(&self) -> PtychoResult<()> {
        if self.ntheta == 0 || self.nz == 0 || self.n == 0 || self.nscan == 0 {
            return Err(PtychoError::ConfigError(
                "geometry dimensions must all be >= 1".to_string(),
            ));
        }
        if self.nprb > self.nz || self.nprb > self.n {
            return Err(PtychoError::ConfigError(format!(
                "probe {}px exceeds projected frame {}x{}",
                self.nprb, self.nz, self.n
            )));
        }
        if self.nprb > self.det[0] || self.nprb > self.det[1] {
            return Err(PtychoError::ConfigError(format!(
                "probe {}px exceeds detector {}x{}",
                self.nprb, self.det[0], self.det[1]
            )));
        }
        if !self.voxelsize.is_finite() || self.voxelsize <= 0.0 {
            return Err(PtychoError::ConfigError(
                "voxelsize must be finite and > 0".to_string(),
            ));
        }
        if !self.energy.is_finite() || self.energy <= 0.0 {
            return Err(PtychoError::ConfigError(
                "energy must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}
