//! Input/output helpers.
//!
//! - height/slope column resolution (`fields`)
//! - GeoJSON footprint ingest + normalization (`ingest`)
//! - distance-grouped GeoJSON export (`export`)

pub mod export;
pub mod fields;
pub mod ingest;

pub use export::*;
pub use fields::*;
pub use ingest::*;
