// ─────────────────────────────────────────────────────────────────────
// SCPN Ptycho-Tomo — Error Taxonomy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

/// All failure modes halt the reconstruction loop; nothing is silently
/// recovered. Configuration errors are raised before any array of
/// solver scale is allocated.
#[derive(Error, Debug)]
pub enum PtychoError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Solver diverged at outer iteration {iteration}: non-finite values in `{variable}`")]
    SolverDiverged { iteration: usize, variable: &'static str },

    #[error("Out of memory in angle batch {batch}: {message}; increase ptheta so batches shrink")]
    BatchExhausted { batch: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PtychoResult<T> = Result<T, PtychoError>;
