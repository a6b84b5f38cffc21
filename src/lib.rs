//! `roof-dsm` library crate.
//!
//! The binary (`rdsm`) is a thin wrapper around this library so that:
//!
//! - the geometry pipeline is testable without spawning processes
//! - the ring generator and chain builders can be reused by other front-ends

pub mod app;
pub mod buffer;
pub mod chain;
pub mod cli;
pub mod config;
pub mod crs;
pub mod domain;
pub mod engine;
pub mod error;
pub mod io;
pub mod report;
