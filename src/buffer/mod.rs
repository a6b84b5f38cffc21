//! Roof contour generation.
//!
//! - per-footprint inward offsets (`inward`)
//! - collection-wide assembly with failure isolation (`assemble`)

pub mod assemble;
pub mod inward;

pub use assemble::*;
pub use inward::*;
