//! Command-line parsing for the roof buffer pipeline.
//!
//! Argument parsing and command dispatch stay separate from the geometry code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_MAX_RINGS, DEFAULT_MIN_AREA, DEFAULT_STEP, HEIGHT_FIELD};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rdsm", version, about = "Roof buffer rings and DSM process chains from building footprints")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate inward buffer rings for every building and export one GeoJSON per distance.
    Buffers(BufferArgs),
    /// Print (or submit) a chain rasterizing a vector layer by attribute.
    Rasterize(RasterizeArgs),
    /// Print (or submit) a chain summing rasters into one surface.
    Aggregate(AggregateArgs),
    /// Create the engine location/mapset if they do not exist yet.
    Workspace(WorkspaceArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BufferArgs {
    /// Building footprints (GeoJSON) with height and slope attributes.
    #[arg(short, long, value_name = "GEOJSON")]
    pub input: PathBuf,

    /// Owner of the output tree.
    #[arg(short, long)]
    pub user: String,

    /// Engine location (default: location_epsg_<working epsg>).
    #[arg(long)]
    pub location: Option<String>,

    /// Engine mapset (default: mapset_<user>_<unix time>).
    #[arg(long)]
    pub mapset: Option<String>,

    /// Treat the input as being in this EPSG code, ignoring any declared CRS.
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Offset between consecutive rings (metres).
    #[arg(long, default_value_t = DEFAULT_STEP)]
    pub step: f64,

    /// Stop once the eroded footprint is smaller than this (square metres).
    #[arg(long, default_value_t = DEFAULT_MIN_AREA)]
    pub min_area: f64,

    /// Maximum rings generated per building.
    #[arg(long, default_value_t = DEFAULT_MAX_RINGS)]
    pub max_rings: usize,

    /// Height attribute candidates, most preferred first (repeatable).
    #[arg(long = "height-field", value_name = "NAME")]
    pub height_fields: Vec<String>,

    /// Slope attribute candidates, most preferred first (repeatable).
    #[arg(long = "slope-field", value_name = "NAME")]
    pub slope_fields: Vec<String>,

    /// Output root (overrides RDSM_DATA_ROOT).
    #[arg(long)]
    pub output_root: Option<PathBuf>,

    /// Worker threads for ring generation (default: all cores).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write a JSON run summary.
    #[arg(long, value_name = "JSON")]
    pub summary: Option<PathBuf>,

    /// Write the rasterize + aggregate chains for the exported groups.
    #[arg(long = "dsm-plan", value_name = "JSON")]
    pub dsm_plan: Option<PathBuf>,

    /// Output raster name used in the DSM plan.
    #[arg(long, default_value = "dsm")]
    pub dsm_name: String,
}

/// Where to submit a chain. Without `--submit` the chain is printed.
#[derive(Debug, Args, Clone)]
pub struct SubmitArgs {
    /// Submit to the engine instead of printing.
    #[arg(long, requires_all = ["location", "mapset"])]
    pub submit: bool,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub mapset: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RasterizeArgs {
    /// Vector layer to rasterize.
    #[arg(long)]
    pub vector: String,

    /// Output raster name.
    #[arg(long)]
    pub output: String,

    /// Attribute column burned into the cells.
    #[arg(long, default_value = HEIGHT_FIELD)]
    pub column: String,

    #[command(flatten)]
    pub target: SubmitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AggregateArgs {
    /// Input rasters (repeatable or comma-separated).
    #[arg(long = "input", value_delimiter = ',', required = true)]
    pub inputs: Vec<String>,

    /// Output raster name.
    #[arg(long, default_value = "dsm")]
    pub output: String,

    #[command(flatten)]
    pub target: SubmitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct WorkspaceArgs {
    #[arg(long)]
    pub epsg: u32,

    /// Defaults to location_epsg_<epsg>.
    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub mapset: String,
}
