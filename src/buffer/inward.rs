//! Inward buffer generation for a single footprint.
//!
//! A sloped roof is approximated as a stack of contours: the footprint is
//! eroded by `step`, `2 × step`, ... and every contour is tagged with the roof
//! height at that horizontal offset. Erosion stops at the first offset whose
//! result is empty, too small, or not a usable polygon, or when the ring cap
//! is reached.

use geo::{Area, Buffer, CoordsIter, MultiPolygon, Polygon, Validation};

use crate::domain::{BufferParams, BufferRing, round_distance};
use crate::error::GeometryError;

/// Relative slack on the minimum-area test. The boolean engine snaps
/// coordinates to an integer grid, so an eroded area that is mathematically
/// equal to the threshold can come back a hair below it.
const AREA_TOLERANCE: f64 = 1e-6;

/// Why ring generation stopped for a footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Erosion consumed the whole footprint.
    Empty,
    /// The eroded area dropped below `min_area`.
    BelowMinArea,
    /// The dominant remaining part was not a valid simple polygon.
    NotPolygonal,
    /// `max_rings` rings were emitted before any other stop condition.
    IterationCap,
}

/// Output of one footprint's erosion loop.
#[derive(Debug, Clone, PartialEq)]
pub struct InwardBuffers {
    pub rings: Vec<BufferRing>,
    pub stop: StopReason,
}

/// Roof height at `distance` from the eaves for a roof pitched at `slope_deg`.
pub fn ring_height(base_height: f64, slope_deg: f64, distance: f64) -> f64 {
    (base_height - slope_deg.to_radians().tan() * distance).max(0.0)
}

/// Erode `footprint` step by step and return the rings in increasing distance.
pub fn generate_inward_buffers(
    building_id: usize,
    footprint: &MultiPolygon<f64>,
    base_height: f64,
    slope_deg: f64,
    params: &BufferParams,
) -> Result<InwardBuffers, GeometryError> {
    validate_inputs(footprint, base_height, slope_deg)?;

    let min_area = params.min_area - AREA_TOLERANCE * params.min_area.max(1.0);
    let mut rings = Vec::new();

    for k in 1..=params.max_rings {
        let distance = params.step * k as f64;
        let eroded = footprint.buffer(-distance);

        if eroded.0.is_empty() {
            return Ok(InwardBuffers {
                rings,
                stop: StopReason::Empty,
            });
        }
        if eroded.unsigned_area() < min_area {
            return Ok(InwardBuffers {
                rings,
                stop: StopReason::BelowMinArea,
            });
        }

        // Only the dominant roof face survives a split.
        let Some(largest) = largest_part(eroded) else {
            return Ok(InwardBuffers {
                rings,
                stop: StopReason::Empty,
            });
        };
        if !is_simple_polygon(&largest) {
            return Ok(InwardBuffers {
                rings,
                stop: StopReason::NotPolygonal,
            });
        }

        rings.push(BufferRing {
            building_id,
            geometry: largest,
            distance: round_distance(distance),
            height: ring_height(base_height, slope_deg, distance),
        });
    }

    Ok(InwardBuffers {
        rings,
        stop: StopReason::IterationCap,
    })
}

fn validate_inputs(footprint: &MultiPolygon<f64>, base_height: f64, slope_deg: f64) -> Result<(), GeometryError> {
    if !(base_height.is_finite() && base_height >= 0.0) {
        return Err(GeometryError::InvalidHeight(base_height));
    }
    if !(slope_deg.is_finite() && (0.0..90.0).contains(&slope_deg)) {
        return Err(GeometryError::InvalidSlope(slope_deg));
    }
    if footprint.0.is_empty() {
        return Err(GeometryError::NotPolygonal("empty multipolygon".to_string()));
    }
    if footprint.coords_iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Err(GeometryError::NonFiniteCoordinates);
    }
    if !footprint.is_valid() {
        return Err(GeometryError::InvalidFootprint(
            "self-intersecting or degenerate ring".to_string(),
        ));
    }
    Ok(())
}

fn largest_part(eroded: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    eroded
        .0
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

fn is_simple_polygon(polygon: &Polygon<f64>) -> bool {
    polygon.exterior().0.len() >= 4 && polygon.is_valid()
}
