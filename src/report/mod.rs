//! Run summaries for the terminal and for `--summary` JSON files.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::app::pipeline::BufferRun;
use crate::domain::BuildingFailure;
use crate::error::AppError;
use crate::io::export::ExportedGroup;

/// Machine-readable digest of one buffer run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source_epsg: u32,
    pub working_epsg: u32,
    pub height_field: String,
    pub slope_field: String,
    pub features_read: usize,
    pub buildings_loaded: usize,
    pub rings: usize,
    pub output_dir: PathBuf,
    pub groups: Vec<ExportedGroup>,
    pub failures: Vec<BuildingFailure>,
}

impl RunSummary {
    pub fn from_run(run: &BufferRun) -> Self {
        Self {
            source_epsg: run.buildings.source_crs.epsg(),
            working_epsg: run.buildings.working_crs.epsg(),
            height_field: run.buildings.fields.height.clone(),
            slope_field: run.buildings.fields.slope.clone(),
            features_read: run.buildings.features_read(),
            buildings_loaded: run.buildings.buildings.len(),
            rings: run.records.len(),
            output_dir: run.output.buffer_dir(),
            groups: run.exported.clone(),
            failures: run.records.failures.clone(),
        }
    }
}

/// Format the run summary (inputs, rings, groups, skipped buildings).
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== rdsm - roof buffer rings ===\n");
    out.push_str(&format!(
        "Fields: height='{}', slope='{}'\n",
        summary.height_field, summary.slope_field
    ));
    if summary.source_epsg == summary.working_epsg {
        out.push_str(&format!("CRS: EPSG:{}\n", summary.working_epsg));
    } else {
        out.push_str(&format!(
            "CRS: EPSG:{} -> EPSG:{}\n",
            summary.source_epsg, summary.working_epsg
        ));
    }
    out.push_str(&format!(
        "Buildings: {} loaded / {} features\n",
        summary.buildings_loaded, summary.features_read
    ));
    out.push_str(&format!("Rings: {}\n", summary.rings));
    out.push_str(&format!("Output: {}\n", summary.output_dir.display()));

    if !summary.groups.is_empty() {
        out.push_str("\nDistance groups:\n");
        for g in &summary.groups {
            out.push_str(&format!("  {:>8.2} m  {:>6} rings  {}\n", g.distance, g.features, g.path.display()));
        }
    }

    if !summary.failures.is_empty() {
        out.push_str(&format!("\nSkipped buildings ({}):\n", summary.failures.len()));
        for f in &summary.failures {
            out.push_str(&format!("  #{}: {}\n", f.building_id, f.reason));
        }
    }

    out
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::io(format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}
