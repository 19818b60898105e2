// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Snapshot Persistence
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lossless floating-point persistence of reconstruction results.
//!
//! Arrays go out as `.npy` files under a target directory: one example
//! diffraction frame, the two object channels (full volume and
//! mid-slice) and the final wavefield phase and amplitude. The engine
//! itself never reads these back; they exist for downstream analysis.

use std::path::{Path, PathBuf};

use ndarray::{s, Array2, Array3};
use ndarray_npy::write_npy;
use ptycho_math::fft::fftshift2;
use ptycho_types::error::{PtychoError, PtychoResult};
use ptycho_types::state::AdmmResult;

pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create the target directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> PtychoResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(SnapshotWriter { dir })
    }

    fn path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.npy"))
    }

    pub fn write_2d(&self, tag: &str, frame: &Array2<f64>) -> PtychoResult<()> {
        write_npy(self.path(tag), frame).map_err(|e| npy_io(tag, e))
    }

    pub fn write_3d(&self, tag: &str, volume: &Array3<f64>) -> PtychoResult<()> {
        write_npy(self.path(tag), volume).map_err(|e| npy_io(tag, e))
    }

    /// Persist one diffraction pattern, fftshifted so the zero
    /// frequency sits in the centre.
    pub fn write_diffraction(&self, tag: &str, frame: &Array2<f64>) -> PtychoResult<()> {
        self.write_2d(tag, &fftshift2(frame))
    }

    /// Persist the full result set: delta/beta volumes, their
    /// mid-slices, and the phase/amplitude of the central wavefield.
    pub fn write_result(&self, result: &AdmmResult, tag: &str) -> PtychoResult<()> {
        let delta = result.u.mapv(|c| c.re);
        let beta = result.u.mapv(|c| c.im);
        self.write_3d(&format!("delta_{tag}"), &delta)?;
        self.write_3d(&format!("beta_{tag}"), &beta)?;

        let mid = result.u.dim().0 / 2;
        self.write_2d(&format!("delta_mid_{tag}"), &delta.slice(s![mid, .., ..]).to_owned())?;
        self.write_2d(&format!("beta_mid_{tag}"), &beta.slice(s![mid, .., ..]).to_owned())?;

        let central_angle = result.psi.dim().0 / 2;
        let frame = result.psi.slice(s![central_angle, .., ..]);
        self.write_2d(&format!("psi_angle_{tag}"), &frame.mapv(|c| c.arg()))?;
        self.write_2d(&format!("psi_amp_{tag}"), &frame.mapv(|c| c.norm()))?;
        Ok(())
    }
}

fn npy_io(tag: &str, e: ndarray_npy::WriteNpyError) -> PtychoError {
    PtychoError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("snapshot `{tag}`: {e}"),
    ))
}
