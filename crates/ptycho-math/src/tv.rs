// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Total Variation Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Finite-difference gradient, divergence and the isotropic
//! soft-thresholding proximal step for the TV penalty.
//!
//! `divergence` is the exact negative adjoint of `gradient`, so the
//! identity `<gradient(u), g> = -<u, divergence(g)>` holds to
//! floating-point roundoff. The consensus update of the outer loop
//! relies on this pairing.

use ndarray::{Array3, Array4};
use num_complex::Complex64;

/// Forward differences along the three spatial axes.
///
/// Output shape is `[3, nz, n, n]` with a zero in the last sample of
/// each axis (one-sided boundary).
pub fn gradient(u: &Array3<Complex64>) -> Array4<Complex64> {
    let (nz, ny, nx) = u.dim();
    let mut g = Array4::zeros((3, nz, ny, nx));
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                if z + 1 < nz {
                    g[[0, z, y, x]] = u[[z + 1, y, x]] - u[[z, y, x]];
                }
                if y + 1 < ny {
                    g[[1, z, y, x]] = u[[z, y + 1, x]] - u[[z, y, x]];
                }
                if x + 1 < nx {
                    g[[2, z, y, x]] = u[[z, y, x + 1]] - u[[z, y, x]];
                }
            }
        }
    }
    g
}

/// Negative adjoint of [`gradient`].
///
/// Along each axis of length m: out[0] = g[0], out[j] = g[j] - g[j-1]
/// for interior j, out[m-1] = -g[m-2]; contributions from the three
/// axes are summed.
pub fn divergence(g: &Array4<Complex64>) -> Array3<Complex64> {
    let (_, nz, ny, nx) = g.dim();
    let mut out = Array3::zeros((nz, ny, nx));

    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let mut acc = Complex64::new(0.0, 0.0);

                acc += axis_term(|i| g[[0, i, y, x]], z, nz);
                acc += axis_term(|i| g[[1, z, i, x]], y, ny);
                acc += axis_term(|i| g[[2, z, y, i]], x, nx);

                out[[z, y, x]] = acc;
            }
        }
    }
    out
}

#[inline]
fn axis_term(g: impl Fn(usize) -> Complex64, j: usize, m: usize) -> Complex64 {
    if m == 1 {
        Complex64::new(0.0, 0.0)
    } else if j == 0 {
        g(0)
    } else if j == m - 1 {
        -g(m - 2)
    } else {
        g(j) - g(j - 1)
    }
}

/// Isotropic vector soft-thresholding.
///
/// The shrinkage magnitude groups the three directional components per
/// voxel: a = sqrt(sum_d |g_d|^2), and every component is scaled by
/// max(a - threshold, 0) / a.
pub fn shrink(g: &Array4<Complex64>, threshold: f64) -> Array4<Complex64> {
    let (nd, nz, ny, nx) = g.dim();
    debug_assert_eq!(nd, 3);
    let mut out = Array4::zeros((nd, nz, ny, nx));
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let amp = (0..nd)
                    .map(|d| g[[d, z, y, x]].norm_sqr())
                    .sum::<f64>()
                    .sqrt();
                if amp <= threshold || amp == 0.0 {
                    continue;
                }
                let factor = (amp - threshold) / amp;
                for d in 0..nd {
                    out[[d, z, y, x]] = g[[d, z, y, x]] * factor;
                }
            }
        }
    }
    out
}

/// Isotropic TV value: sum over voxels of the grouped gradient
/// magnitude. Used for the Lagrangian diagnostic.
pub fn tv_norm(g: &Array4<Complex64>) -> f64 {
    let (nd, nz, ny, nx) = g.dim();
    let mut total = 0.0;
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                total += (0..nd)
                    .map(|d| g[[d, z, y, x]].norm_sqr())
                    .sum::<f64>()
                    .sqrt();
            }
        }
    }
    total
}
