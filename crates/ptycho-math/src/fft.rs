// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — FFT
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! 2D complex FFT wrappers around rustfft.
//!
//! Both directions are unitary (scaled by 1/sqrt(nrows*ncols)), so the
//! inverse transform is exactly the adjoint of the forward transform.
//! That convention makes the far-field diffraction operator and its
//! adjoint an exact adjoint pair.

use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

/// Cached unitary 2D FFT plans for a fixed [nrows, ncols] frame.
///
/// Plan creation is the expensive part of rustfft; callers that
/// transform many same-sized frames (one per scan position per angle)
/// should build one `Fft2` and reuse it.
pub struct Fft2 {
    nrows: usize,
    ncols: usize,
    fwd_row: Arc<dyn Fft<f64>>,
    fwd_col: Arc<dyn Fft<f64>>,
    inv_row: Arc<dyn Fft<f64>>,
    inv_col: Arc<dyn Fft<f64>>,
}

impl Fft2 {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        let mut planner = FftPlanner::new();
        Fft2 {
            nrows,
            ncols,
            fwd_row: planner.plan_fft_forward(ncols),
            fwd_col: planner.plan_fft_forward(nrows),
            inv_row: planner.plan_fft_inverse(ncols),
            inv_col: planner.plan_fft_inverse(nrows),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Unitary forward 2D FFT, in place.
    pub fn forward(&self, data: &mut Array2<Complex64>) {
        self.apply(data, &self.fwd_row, &self.fwd_col);
    }

    /// Unitary inverse 2D FFT, in place.
    pub fn inverse(&self, data: &mut Array2<Complex64>) {
        self.apply(data, &self.inv_row, &self.inv_col);
    }

    fn apply(&self, data: &mut Array2<Complex64>, row_fft: &Arc<dyn Fft<f64>>, col_fft: &Arc<dyn Fft<f64>>) {
        assert_eq!(
            data.dim(),
            (self.nrows, self.ncols),
            "frame shape must match the planned FFT size"
        );

        // FFT along each row (axis 1)
        for mut row in data.rows_mut() {
            let slice = row.as_slice_mut().expect("row must be contiguous");
            row_fft.process(slice);
        }

        // FFT along each column (axis 0): transpose, FFT rows, transpose back
        let mut transposed = Array2::zeros((self.ncols, self.nrows));
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                transposed[[j, i]] = data[[i, j]];
            }
        }
        for mut row in transposed.rows_mut() {
            let slice = row.as_slice_mut().expect("row must be contiguous");
            col_fft.process(slice);
        }

        let norm = 1.0 / ((self.nrows * self.ncols) as f64).sqrt();
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                data[[i, j]] = transposed[[j, i]] * norm;
            }
        }
    }
}

/// One-shot unitary forward 2D FFT.
pub fn fft2c(input: &Array2<Complex64>) -> Array2<Complex64> {
    let (nr, nc) = input.dim();
    let mut out = input.clone();
    Fft2::new(nr, nc).forward(&mut out);
    out
}

/// One-shot unitary inverse 2D FFT.
pub fn ifft2c(input: &Array2<Complex64>) -> Array2<Complex64> {
    let (nr, nc) = input.dim();
    let mut out = input.clone();
    Fft2::new(nr, nc).inverse(&mut out);
    out
}

/// Swap quadrants so the zero-frequency sample lands in the centre.
/// Matches `numpy.fft.fftshift` for 2D input.
pub fn fftshift2(input: &Array2<f64>) -> Array2<f64> {
    let (nr, nc) = input.dim();
    let mut out = Array2::zeros((nr, nc));
    for i in 0..nr {
        for j in 0..nc {
            out[[(i + nr / 2) % nr, (j + nc / 2) % nc]] = input[[i, j]];
        }
    }
    out
}
