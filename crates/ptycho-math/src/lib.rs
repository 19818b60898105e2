//! Numerical primitives for SCPN Ptycho-Tomo.

pub mod fft;
pub mod tv;
