//! Shared domain types.
//!
//! These types flow through the whole pipeline:
//!
//! - `Building` is produced by the loader and only ever read afterwards
//! - `BufferRing` is produced by the inward buffer generator
//! - `BufferRecordSet` collects rings (and skipped buildings) for export

use std::path::PathBuf;

use geo::{MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Height attribute names, most preferred first.
pub const DEFAULT_HEIGHT_FIELDS: &[&str] = &["height", "HEIGHT", "Height", "h", "H", "ALTEZZA_VO", "building_h"];

/// Slope attribute names, most preferred first.
pub const DEFAULT_SLOPE_FIELDS: &[&str] = &["slope", "SLOPE", "Slope"];

pub const DEFAULT_STEP: f64 = 0.5;
pub const DEFAULT_MIN_AREA: f64 = 1.0;
pub const DEFAULT_MAX_RINGS: usize = 10_000;

/// Canonical attribute names after normalization.
pub const HEIGHT_FIELD: &str = "height";
pub const SLOPE_FIELD: &str = "slope";

/// Prioritized attribute names for the height and slope columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCandidates {
    pub height: Vec<String>,
    pub slope: Vec<String>,
}

impl Default for FieldCandidates {
    fn default() -> Self {
        Self {
            height: DEFAULT_HEIGHT_FIELDS.iter().map(|s| s.to_string()).collect(),
            slope: DEFAULT_SLOPE_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One building footprint after loading and normalization.
///
/// `id` is the feature's position in the source collection, so it stays
/// stable even when other features are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: usize,
    pub footprint: MultiPolygon<f64>,
    pub height: f64,
    pub slope_deg: f64,
}

/// One inward offset of a building footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRing {
    pub building_id: usize,
    pub geometry: Polygon<f64>,
    /// Offset from the footprint boundary, rounded to two decimals.
    pub distance: f64,
    pub height: f64,
}

impl BufferRing {
    /// Partition key: the distance expressed in hundredths.
    pub fn distance_key(&self) -> i64 {
        distance_key(self.distance)
    }
}

/// Round an offset distance to two decimals, ties to even on the exact
/// binary value (`0.125` -> `0.12`, `0.375` -> `0.38`).
pub fn round_distance(distance: f64) -> f64 {
    format!("{distance:.2}").parse().unwrap_or(distance)
}

pub fn distance_key(distance: f64) -> i64 {
    (round_distance(distance) * 100.0).round() as i64
}

/// A building that was skipped (or cut short) during processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingFailure {
    pub building_id: usize,
    pub reason: String,
}

/// Every ring across every building, plus the buildings that produced none
/// because they failed.
#[derive(Debug, Clone, Default)]
pub struct BufferRecordSet {
    pub rings: Vec<BufferRing>,
    pub failures: Vec<BuildingFailure>,
    /// EPSG code of the working (projected) reference system.
    pub epsg: Option<u32>,
}

impl BufferRecordSet {
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn rings_for(&self, building_id: usize) -> impl Iterator<Item = &BufferRing> {
        self.rings.iter().filter(move |r| r.building_id == building_id)
    }
}

/// Generator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    /// Linear offset increment (working CRS units, metres).
    pub step: f64,
    /// Rings whose eroded area falls below this are not emitted.
    pub min_area: f64,
    /// Hard cap on rings per building.
    pub max_rings: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            min_area: DEFAULT_MIN_AREA,
            max_rings: DEFAULT_MAX_RINGS,
        }
    }
}

impl BufferParams {
    pub fn new(step: f64, min_area: f64, max_rings: usize) -> Result<Self, AppError> {
        let params = Self {
            step,
            min_area,
            max_rings,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(AppError::invalid_argument(format!(
                "Buffer step must be a positive number, got {}.",
                self.step
            )));
        }
        if !(self.min_area.is_finite() && self.min_area > 0.0) {
            return Err(AppError::invalid_argument(format!(
                "Minimum ring area must be a positive number, got {}.",
                self.min_area
            )));
        }
        if self.max_rings == 0 {
            return Err(AppError::invalid_argument("Maximum rings per building must be at least 1."));
        }
        Ok(())
    }
}

/// Where exported artifacts land: `<root>/<user>/<location>/<mapset>/buffer/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputContext {
    pub root: PathBuf,
    pub user: String,
    pub location: String,
    pub mapset: String,
}

impl OutputContext {
    pub fn buffer_dir(&self) -> PathBuf {
        self.root
            .join(&self.user)
            .join(&self.location)
            .join(&self.mapset)
            .join("buffer")
    }
}

/// Engine location name for a given EPSG code.
pub fn location_name(epsg: u32) -> String {
    format!("location_epsg_{epsg}")
}

/// Default mapset name for a user at a unix timestamp.
pub fn default_mapset_name(user: &str, timestamp: i64) -> String {
    format!("mapset_{user}_{timestamp}")
}
