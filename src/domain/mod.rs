//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - loaded inputs (`Building`, `FieldCandidates`)
//! - generator parameters and outputs (`BufferParams`, `BufferRing`)
//! - the flattened record set handed to the exporter (`BufferRecordSet`)

pub mod types;

pub use types::*;
