// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Angle Batch Scheduler
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Partition of the angular dimension into contiguous batches.
//!
//! Batches exist purely to bound peak memory of the ptychography pass;
//! they are processed strictly sequentially and results are independent
//! across batches. Remainder policy when `ntheta` does not divide by
//! `ptheta`: the last batch absorbs the remainder, so every angle is
//! covered exactly once and no batch is empty.

use std::ops::Range;

use ptycho_types::error::{PtychoError, PtychoResult};

/// Contiguous angle-index ranges `[k*ntheta/ptheta, (k+1)*ntheta/ptheta)`,
/// with the remainder folded into the final range.
pub fn angle_batches(ntheta: usize, ptheta: usize) -> PtychoResult<Vec<Range<usize>>> {
    if ptheta == 0 {
        return Err(PtychoError::ConfigError(
            "ptheta must be >= 1".to_string(),
        ));
    }
    if ptheta > ntheta {
        return Err(PtychoError::ConfigError(format!(
            "ptheta = {ptheta} exceeds angle count {ntheta}"
        )));
    }
    let base = ntheta / ptheta;
    let mut ranges = Vec::with_capacity(ptheta);
    for k in 0..ptheta {
        let start = k * base;
        let end = if k + 1 == ptheta { ntheta } else { (k + 1) * base };
        ranges.push(start..end);
    }
    Ok(ranges)
}

/// Bytes of `Complex64` the far-field buffer of one batch needs.
/// Overflow or an allocation beyond the address space is reported with
/// the batch index; the mitigation is a larger `ptheta`.
pub fn ensure_batch_fits(
    batch: usize,
    angles: usize,
    nscan: usize,
    det: [usize; 2],
) -> PtychoResult<()> {
    let elems = angles
        .checked_mul(nscan)
        .and_then(|v| v.checked_mul(det[0]))
        .and_then(|v| v.checked_mul(det[1]))
        .and_then(|v| v.checked_mul(std::mem::size_of::<f64>() * 2));
    match elems {
        Some(bytes) if bytes <= isize::MAX as usize => Ok(()),
        _ => Err(PtychoError::BatchExhausted {
            batch,
            message: format!(
                "far-field buffer {angles}x{nscan}x{}x{} does not fit in memory",
                det[0], det[1]
            ),
        }),
    }
}
