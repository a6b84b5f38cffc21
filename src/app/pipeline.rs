//! Shared buffer pipeline used by the CLI commands.
//!
//! load -> normalize -> generate rings -> export distance groups
//!
//! and, on top of the exported groups, the rasterize/aggregate chains that
//! turn them into a surface model on the engine.

use std::path::PathBuf;

use serde::Serialize;

use crate::buffer::assemble_buffer_records;
use crate::chain::{ProcessChain, build_aggregate_chain, build_rasterize_chain};
use crate::domain::{
    BufferParams, BufferRecordSet, FieldCandidates, HEIGHT_FIELD, OutputContext, default_mapset_name, location_name,
};
use crate::error::AppError;
use crate::io::export::{ExportedGroup, distance_label, export_distance_groups};
use crate::io::ingest::{NormalizedBuildings, load_buildings};

/// Everything a buffer run needs.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub input: PathBuf,
    pub candidates: FieldCandidates,
    pub epsg_override: Option<u32>,
    pub params: BufferParams,
    pub data_root: PathBuf,
    pub user: String,
    /// Defaults to `location_epsg_<working epsg>`.
    pub location: Option<String>,
    /// Defaults to `mapset_<user>_<unix time>`.
    pub mapset: Option<String>,
}

/// All outputs of one buffer run.
#[derive(Debug, Clone)]
pub struct BufferRun {
    pub buildings: NormalizedBuildings,
    pub records: BufferRecordSet,
    pub output: OutputContext,
    pub exported: Vec<ExportedGroup>,
}

/// Load, erode and export. Load-time errors abort before any building is processed.
pub fn run_buffers(config: &BufferConfig) -> Result<BufferRun, AppError> {
    config.params.validate()?;
    if config.user.trim().is_empty() {
        return Err(AppError::invalid_argument("A user name is required for the output path."));
    }

    let buildings = load_buildings(&config.input, &config.candidates, config.epsg_override)?;
    let records = assemble_buffer_records(&buildings, &config.params)?;

    let output = OutputContext {
        root: config.data_root.clone(),
        user: config.user.clone(),
        location: config
            .location
            .clone()
            .unwrap_or_else(|| location_name(buildings.working_crs.epsg())),
        mapset: config
            .mapset
            .clone()
            .unwrap_or_else(|| default_mapset_name(&config.user, chrono::Utc::now().timestamp())),
    };

    let exported = export_distance_groups(&records, &output)?;

    Ok(BufferRun {
        buildings,
        records,
        output,
        exported,
    })
}

/// Chains that rasterize every exported group and sum them into one surface.
#[derive(Debug, Clone, Serialize)]
pub struct DsmPlan {
    pub rasterize: Vec<ProcessChain>,
    pub aggregate: ProcessChain,
}

/// Vector layer name for a group once imported into the engine.
pub fn group_layer_name(distance: f64) -> String {
    format!("buffer_{}", distance_label(distance))
}

pub fn plan_dsm_chains(groups: &[ExportedGroup], dsm_name: &str) -> Result<DsmPlan, AppError> {
    let mut rasterize = Vec::with_capacity(groups.len());
    let mut rasters = Vec::with_capacity(groups.len());
    for group in groups {
        let vector = group_layer_name(group.distance);
        let raster = format!("{vector}_r");
        rasterize.push(build_rasterize_chain(&vector, &raster, HEIGHT_FIELD)?);
        rasters.push(raster);
    }
    let aggregate = build_aggregate_chain(rasters.as_slice(), dsm_name)?;
    Ok(DsmPlan { rasterize, aggregate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "EPSG:32632" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "HEIGHT": 9, "slope": 45 },
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]] }
            },
            {
                "type": "Feature",
                "properties": { "HEIGHT": 3, "slope": 10 },
                "geometry": { "type": "Polygon", "coordinates": [[[20, 0], [30, 10], [30, 0], [20, 10], [20, 0]]] }
            },
            {
                "type": "Feature",
                "properties": { "HEIGHT": 6, "slope": 30 },
                "geometry": { "type": "Polygon", "coordinates": [[[40, 0], [44, 0], [44, 4], [40, 4], [40, 0]]] }
            }
        ]
    }"#;

    fn config(tmp: &TempDir) -> BufferConfig {
        let input = tmp.path().join("buildings.geojson");
        fs::write(&input, BUILDINGS).unwrap();
        BufferConfig {
            input,
            candidates: FieldCandidates::default(),
            epsg_override: None,
            params: BufferParams::default(),
            data_root: tmp.path().join("userdata"),
            user: "alice".to_string(),
            location: None,
            mapset: Some("mapset_alice_1".to_string()),
        }
    }

    #[test]
    fn end_to_end_run_exports_each_distance() {
        let tmp = TempDir::new().unwrap();
        let run = run_buffers(&config(&tmp)).unwrap();

        assert_eq!(run.output.location, "location_epsg_32632");
        // 10x10 yields 9 rings, 4x4 yields 3 (sides 3, 2, 1); the bowtie is skipped.
        assert_eq!(run.records.len(), 12);
        assert_eq!(run.records.failures.len(), 1);
        assert_eq!(run.records.failures[0].building_id, 1);
        assert_eq!(run.exported.len(), 9);

        let dir = tmp.path().join("userdata/alice/location_epsg_32632/mapset_alice_1/buffer");
        assert!(dir.join("buffer_0_5.geojson").exists());
        assert!(dir.join("buffer_4_5.geojson").exists());
        assert!(!dir.join("buffer_5_0.geojson").exists());
        let first = run.exported.iter().find(|g| g.distance == 0.5).unwrap();
        assert_eq!(first.features, 2);
    }

    #[test]
    fn invalid_params_fail_before_loading() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.input = tmp.path().join("missing.geojson");
        cfg.params.step = -1.0;
        let err = run_buffers(&cfg).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_input_aborts_without_output() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.input = tmp.path().join("missing.geojson");
        let err = run_buffers(&cfg).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
        assert!(!tmp.path().join("userdata").exists());
    }

    #[test]
    fn dsm_plan_rasterizes_every_group() {
        let groups = vec![
            ExportedGroup {
                distance: 0.5,
                path: PathBuf::from("buffer_0_5.geojson"),
                features: 1,
            },
            ExportedGroup {
                distance: 1.0,
                path: PathBuf::from("buffer_1_0.geojson"),
                features: 1,
            },
        ];
        let plan = plan_dsm_chains(&groups, "dsm").unwrap();
        assert_eq!(plan.rasterize.len(), 2);
        assert_eq!(plan.rasterize[1].list[0].input("input"), Some("buffer_1_0"));
        assert_eq!(plan.rasterize[1].list[0].input("output"), Some("buffer_1_0_r"));
        assert_eq!(plan.aggregate.list[0].input("input"), Some("buffer_0_5_r,buffer_1_0_r"));

        assert!(plan_dsm_chains(&[], "dsm").is_err());
    }
}
