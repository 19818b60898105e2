//! Joint ptycho-tomographic reconstruction engine.
//!
//! Physical operators (Radon projection, Beer-Lambert transmission,
//! far-field diffraction), the angle-batch scheduler, the noise/data
//! model, synthetic-experiment factories, snapshot persistence, the
//! ADMM orchestrator that couples the ptychography and tomography
//! sub-problems through consensus variables, and the config-driven
//! experiment driver tying them together.

pub mod batch;
pub mod experiment;
pub mod noise;
pub mod ptycho;
pub mod simulate;
pub mod snapshot;
pub mod solver;
pub mod tomo;
pub mod transmission;
