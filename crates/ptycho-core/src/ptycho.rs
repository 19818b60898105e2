// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Ptychographic Diffraction Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Far-field ptychographic propagation and its adjoint.
//!
//! For every (angle, scan position) pair the forward operator windows a
//! probe-sized patch out of the angle's wavefield, multiplies it by the
//! probe, embeds it in a detector-sized frame and applies the unitary
//! far-field transform. The adjoint undoes the propagation and
//! accumulates probe-weighted contributions back onto the wavefield;
//! overlapping probe footprints sum, they never overwrite.
//!
//! Operands (probe + the active batch's scan slice) are bound through
//! [`BatchOperands`], a borrow scoped to one batch of the angle
//! partition. A binding cannot outlive the arrays it references, which
//! pins operand lifetime to the enclosing batch loop by construction.

use ndarray::{s, Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4};
use num_complex::Complex64;
use ptycho_math::fft::Fft2;
use ptycho_types::error::{PtychoError, PtychoResult};

/// Check that every rounded scan corner keeps the probe inside the
/// `[nz, n]` frame. Out-of-bounds positions are a configuration error,
/// never a silent clamp; both the solver and the simulation path run
/// this before binding operands.
pub fn validate_scan(
    scan: ArrayView3<'_, f64>,
    frame: (usize, usize),
    nprb: usize,
) -> PtychoResult<()> {
    let (nz, n) = frame;
    let (ntheta, nscan, _) = scan.dim();
    for a in 0..ntheta {
        for p in 0..nscan {
            let y = scan[[a, p, 0]].round();
            let x = scan[[a, p, 1]].round();
            if y < 0.0 || x < 0.0 || y as usize + nprb > nz || x as usize + nprb > n {
                return Err(PtychoError::ConfigError(format!(
                    "scan position ({y}, {x}) at angle {a} leaves the {nz}x{n} frame \
                     after accounting for the {nprb}px probe"
                )));
            }
        }
    }
    Ok(())
}

/// Detector-plane propagation engine with cached FFT plans.
pub struct PtychoEngine {
    det: [usize; 2],
    nprb: usize,
    fft: Fft2,
}

/// Batch-scoped operand binding: the probe and the scan-position slice
/// of the active angle batch. Dropped when the batch ends.
pub struct BatchOperands<'a> {
    probe: ArrayView2<'a, Complex64>,
    scan: ArrayView3<'a, f64>,
}

impl<'a> BatchOperands<'a> {
    /// Angles in the bound batch.
    pub fn len(&self) -> usize {
        self.scan.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan positions per angle.
    pub fn nscan(&self) -> usize {
        self.scan.dim().1
    }

    /// Rounded (row, col) patch corner for one (angle, position) pair.
    #[inline]
    fn corner(&self, ia: usize, ip: usize) -> (usize, usize) {
        (
            self.scan[[ia, ip, 0]].round() as usize,
            self.scan[[ia, ip, 1]].round() as usize,
        )
    }
}

impl PtychoEngine {
    pub fn new(det: [usize; 2], nprb: usize) -> PtychoResult<Self> {
        if nprb == 0 {
            return Err(PtychoError::ConfigError("probe size must be >= 1".to_string()));
        }
        if nprb > det[0] || nprb > det[1] {
            return Err(PtychoError::ConfigError(format!(
                "probe {}px exceeds detector {}x{}",
                nprb, det[0], det[1]
            )));
        }
        Ok(PtychoEngine {
            det,
            nprb,
            fft: Fft2::new(det[0], det[1]),
        })
    }

    pub fn det(&self) -> [usize; 2] {
        self.det
    }

    pub fn nprb(&self) -> usize {
        self.nprb
    }

    /// Bind operands for one angle batch.
    ///
    /// `scan` is the `[batch, nscan, 2]` slice of the full scan table;
    /// the binding borrows it together with the probe for the duration
    /// of the batch.
    pub fn bind<'a>(
        &self,
        probe: ArrayView2<'a, Complex64>,
        scan: ArrayView3<'a, f64>,
    ) -> PtychoResult<BatchOperands<'a>> {
        if probe.dim() != (self.nprb, self.nprb) {
            return Err(PtychoError::ConfigError(format!(
                "probe shape {:?} does not match engine probe size {}",
                probe.dim(),
                self.nprb
            )));
        }
        if scan.dim().2 != 2 {
            return Err(PtychoError::ConfigError(
                "scan table must have a trailing axis of size 2".to_string(),
            ));
        }
        Ok(BatchOperands { probe, scan })
    }

    /// Forward propagation for one batch:
    /// `[batch, nz, n] -> [batch, nscan, det0, det1]`.
    pub fn fwd(&self, ops: &BatchOperands<'_>, psi: ArrayView3<'_, Complex64>) -> Array4<Complex64> {
        let (nb, nz, n) = psi.dim();
        assert_eq!(nb, ops.len(), "psi batch must match the bound scan slice");
        let nprb = self.nprb;
        let mut out = Array4::zeros((nb, ops.nscan(), self.det[0], self.det[1]));

        let mut frame = Array2::zeros((self.det[0], self.det[1]));
        for ia in 0..nb {
            for ip in 0..ops.nscan() {
                let (iy, ix) = ops.corner(ia, ip);
                assert!(
                    iy + nprb <= nz && ix + nprb <= n,
                    "scan position ({iy}, {ix}) leaves the frame; caller must validate bounds"
                );
                frame.fill(Complex64::new(0.0, 0.0));
                for py in 0..nprb {
                    for px in 0..nprb {
                        frame[[py, px]] = psi[[ia, iy + py, ix + px]] * ops.probe[[py, px]];
                    }
                }
                self.fft.forward(&mut frame);
                out.slice_mut(s![ia, ip, .., ..]).assign(&frame);
            }
        }
        out
    }

    /// Adjoint propagation for one batch:
    /// `[batch, nscan, det0, det1] -> [batch, nz, n]`.
    ///
    /// `frame_dims` is the `(nz, n)` shape of one wavefield frame.
    pub fn adj(
        &self,
        ops: &BatchOperands<'_>,
        farfield: ArrayView4<'_, Complex64>,
        frame_dims: (usize, usize),
    ) -> Array3<Complex64> {
        let (nb, nscan, d0, d1) = farfield.dim();
        assert_eq!(nb, ops.len(), "far-field batch must match the bound scan slice");
        assert_eq!(nscan, ops.nscan());
        assert_eq!([d0, d1], self.det);
        let (nz, n) = frame_dims;
        let nprb = self.nprb;
        let mut psi = Array3::zeros((nb, nz, n));

        let mut frame = Array2::zeros((self.det[0], self.det[1]));
        for ia in 0..nb {
            for ip in 0..nscan {
                let (iy, ix) = ops.corner(ia, ip);
                assert!(iy + nprb <= nz && ix + nprb <= n);
                frame.assign(&farfield.slice(s![ia, ip, .., ..]));
                self.fft.inverse(&mut frame);
                for py in 0..nprb {
                    for px in 0..nprb {
                        // Overlap accumulation: contributions sum.
                        psi[[ia, iy + py, ix + px]] +=
                            frame[[py, px]] * ops.probe[[py, px]].conj();
                    }
                }
            }
        }
        psi
    }

    /// Detector normalization coefficient for intensity formation.
    ///
    /// Chosen so a flat unit-transmission region reports a maximal
    /// intensity equal to the probe's peak intensity: the probe's DC
    /// power under the unitary transform, divided by its peak.
    pub fn detector_coef(&self, probe: ArrayView2<'_, Complex64>) -> f64 {
        let amp_sum: f64 = probe.iter().map(|c| c.norm()).sum();
        let peak: f64 = probe.iter().map(|c| c.norm_sqr()).fold(0.0, f64::max);
        amp_sum * amp_sum / (peak * (self.det[0] * self.det[1]) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(nprb: usize) -> Array2<Complex64> {
        Array2::from_shape_fn((nprb, nprb), |(i, j)| {
            Complex64::new(1.0 + (i as f64) * 0.1, (j as f64) * 0.05)
        })
    }

    fn scan_table(nb: usize, nscan: usize) -> Array3<f64> {
        Array3::from_shape_fn((nb, nscan, 2), |(ia, ip, c)| {
            // Staggered but in-bounds for an 8x12 frame with a 4px probe.
            ((ia + ip * 2 + c) % 4) as f64
        })
    }

    #[test]
    fn probe_exceeding_detector_rejected() {
        assert!(PtychoEngine::new([8, 8], 16).is_err());
    }

    #[test]
    fn mismatched_probe_binding_rejected() {
        let engine = PtychoEngine::new([8, 8], 4).expect("engine");
        let prb = probe(5);
        let scan = scan_table(2, 3);
        assert!(engine.bind(prb.view(), scan.view()).is_err());
    }

    #[test]
    fn forward_adjoint_inner_products_agree() {
        let engine = PtychoEngine::new([8, 8], 4).expect("engine");
        let prb = probe(4);
        let scan = scan_table(3, 5);
        let ops = engine.bind(prb.view(), scan.view()).expect("bind");

        let psi = Array3::from_shape_fn((3, 8, 12), |(a, z, x)| {
            Complex64::new(
                ((a * 17 + z * 3 + x) as f64 * 0.21).sin(),
                ((a + z * 7 + x * 2) as f64 * 0.33).cos(),
            )
        });
        let y = Array4::from_shape_fn((3, 5, 8, 8), |(a, p, i, j)| {
            Complex64::new(
                ((a * 3 + p * 11 + i + j * 5) as f64 * 0.17).cos(),
                ((a + p + i * 3 + j) as f64 * 0.47).sin(),
            )
        });

        let lhs: Complex64 = engine
            .fwd(&ops, psi.view())
            .iter()
            .zip(y.iter())
            .map(|(a, b)| a * b.conj())
            .sum();
        let rhs: Complex64 = psi
            .iter()
            .zip(engine.adj(&ops, y.view(), (8, 12)).iter())
            .map(|(a, b)| a * b.conj())
            .sum();

        assert!(
            (lhs - rhs).norm() < 1e-9 * (1.0 + lhs.norm()),
            "<Fpsi, y> = {lhs}, <psi, F^H y> = {rhs}"
        );
    }

    #[test]
    fn overlapping_footprints_accumulate() {
        let engine = PtychoEngine::new([4, 4], 4).expect("engine");
        let prb = Array2::from_elem((4, 4), Complex64::new(1.0, 0.0));
        // Two positions at the same corner: adjoint contributions must
        // sum, so the result is exactly twice the single-position one.
        let scan2 = Array3::zeros((1, 2, 2));
        let scan1 = Array3::zeros((1, 1, 2));

        let ff1 = Array4::from_shape_fn((1, 1, 4, 4), |(_, _, i, j)| {
            Complex64::new((i + j) as f64, (i * j) as f64)
        });
        let mut ff2 = Array4::zeros((1, 2, 4, 4));
        ff2.slice_mut(s![0, 0, .., ..]).assign(&ff1.slice(s![0, 0, .., ..]));
        ff2.slice_mut(s![0, 1, .., ..]).assign(&ff1.slice(s![0, 0, .., ..]));

        let ops1 = engine.bind(prb.view(), scan1.view()).expect("bind");
        let one = engine.adj(&ops1, ff1.view(), (4, 4));
        let ops2 = engine.bind(prb.view(), scan2.view()).expect("bind");
        let two = engine.adj(&ops2, ff2.view(), (4, 4));

        for (a, b) in one.iter().zip(two.iter()) {
            assert!((*b - *a * 2.0).norm() < 1e-12);
        }
    }

    #[test]
    fn detector_coef_reports_peak_for_flat_field() {
        // Flat unit transmission seen through the probe: the maximal
        // normalized intensity equals the probe's peak intensity.
        let det = [16, 16];
        let nprb = 8;
        let engine = PtychoEngine::new(det, nprb).expect("engine");
        let maxint = 0.1f64;
        let prb = Array2::from_elem((nprb, nprb), Complex64::new(maxint.sqrt(), 0.0));
        let scan = Array3::zeros((1, 1, 2));
        let ops = engine.bind(prb.view(), scan.view()).expect("bind");

        let psi = Array3::from_elem((1, nprb, nprb), Complex64::new(1.0, 0.0));
        let ff = engine.fwd(&ops, psi.view());
        let coef = engine.detector_coef(prb.view());
        let max_i = ff.iter().map(|c| c.norm_sqr()).fold(0.0, f64::max) / coef;
        assert!(
            (max_i - maxint).abs() < 1e-12,
            "max normalized intensity {max_i} vs maxint {maxint}"
        );
    }
}
