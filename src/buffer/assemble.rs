//! Run the inward buffer generator over a whole building collection.
//!
//! Buildings are independent, so they are processed in parallel. A failure on
//! one footprint is logged and recorded as a `BuildingFailure`; it never stops
//! the others.

use rayon::prelude::*;

use crate::buffer::inward::{InwardBuffers, StopReason, generate_inward_buffers};
use crate::domain::{BufferParams, BufferRecordSet, BufferRing, Building, BuildingFailure};
use crate::error::{AppError, GeometryError};
use crate::io::ingest::NormalizedBuildings;

enum Outcome {
    Rings(InwardBuffers),
    Failed(GeometryError),
}

/// Flatten every building's rings into one record set.
///
/// Failures already recorded by the loader are carried over so the caller
/// sees every skipped feature in one place.
pub fn assemble_buffer_records(
    collection: &NormalizedBuildings,
    params: &BufferParams,
) -> Result<BufferRecordSet, AppError> {
    let mut records = assemble_buildings(&collection.buildings, params)?;
    records.epsg = Some(collection.working_crs.epsg());

    let mut failures = collection.skipped.clone();
    failures.append(&mut records.failures);
    failures.sort_by_key(|f| f.building_id);
    records.failures = failures;

    Ok(records)
}

/// Generate rings for `buildings`, isolating per-building failures.
pub fn assemble_buildings(buildings: &[Building], params: &BufferParams) -> Result<BufferRecordSet, AppError> {
    params.validate()?;

    tracing::info!(
        buildings = buildings.len(),
        step = params.step,
        min_area = params.min_area,
        "Generating inward buffers"
    );

    let outcomes: Vec<(usize, Outcome)> = buildings
        .par_iter()
        .map(|b| {
            let outcome = match generate_inward_buffers(b.id, &b.footprint, b.height, b.slope_deg, params) {
                Ok(buffers) => Outcome::Rings(buffers),
                Err(e) => Outcome::Failed(e),
            };
            (b.id, outcome)
        })
        .collect();

    let mut rings: Vec<BufferRing> = Vec::new();
    let mut failures = Vec::new();

    for (building_id, outcome) in outcomes {
        match outcome {
            Outcome::Rings(buffers) => {
                tracing::debug!(building_id, rings = buffers.rings.len(), stop = ?buffers.stop, "Building processed");
                if buffers.stop == StopReason::IterationCap {
                    tracing::warn!(
                        building_id,
                        max_rings = params.max_rings,
                        "Ring cap reached before the footprint was exhausted"
                    );
                    failures.push(BuildingFailure {
                        building_id,
                        reason: format!("iteration cap of {} rings reached", params.max_rings),
                    });
                }
                rings.extend(buffers.rings);
            }
            Outcome::Failed(err) => {
                tracing::warn!(building_id, error = %err, "Skipping building");
                failures.push(BuildingFailure {
                    building_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(rings = rings.len(), failures = failures.len(), "Inward buffers generated");

    Ok(BufferRecordSet {
        rings,
        failures,
        epsg: None,
    })
}
