//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - sets up logging and settings
//! - parses CLI arguments
//! - runs the buffer pipeline or builds/submits process chains

use std::fs::File;
use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::chain::{ProcessChain, build_aggregate_chain, build_rasterize_chain};
use crate::cli::{AggregateArgs, BufferArgs, Command, RasterizeArgs, SubmitArgs, WorkspaceArgs};
use crate::config::Settings;
use crate::domain::{BufferParams, FieldCandidates, location_name};
use crate::engine::EngineClient;
use crate::error::AppError;
use crate::io::export::ExportedGroup;
use crate::report::{RunSummary, format_run_summary, write_summary_json};

pub mod pipeline;

/// Entry point for the `rdsm` binary.
pub fn run() -> Result<(), AppError> {
    init_logging();
    let settings = Settings::from_env();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Buffers(args) => handle_buffers(args, &settings),
        Command::Rasterize(args) => handle_rasterize(args, &settings),
        Command::Aggregate(args) => handle_aggregate(args, &settings),
        Command::Workspace(args) => handle_workspace(args, &settings),
    }
}

/// Logs go to stderr so chain JSON on stdout stays pipeable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_buffers(args: BufferArgs, settings: &Settings) -> Result<(), AppError> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| AppError::invalid_argument(format!("Failed to configure {threads} worker threads: {e}")))?;
    }

    let config = buffer_config_from_args(&args, settings)?;
    let run = pipeline::run_buffers(&config)?;
    let summary = RunSummary::from_run(&run);

    println!("{}", format_run_summary(&summary));

    if let Some(path) = &args.summary {
        write_summary_json(path, &summary)?;
    }
    if let Some(path) = &args.dsm_plan {
        write_dsm_plan(path, &run.exported, &args.dsm_name)?;
    }

    Ok(())
}

/// Returns whether a plan was written; a run with no exported groups has nothing to rasterize.
fn write_dsm_plan(path: &Path, exported: &[ExportedGroup], dsm_name: &str) -> Result<bool, AppError> {
    if exported.is_empty() {
        tracing::warn!(path = %path.display(), "No buffer groups were exported; skipping DSM plan");
        return Ok(false);
    }
    let plan = pipeline::plan_dsm_chains(exported, dsm_name)?;
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create DSM plan '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &plan)
        .map_err(|e| AppError::io(format!("Failed to write DSM plan: {e}")))?;
    tracing::info!(path = %path.display(), "Wrote DSM plan");
    Ok(true)
}

fn handle_rasterize(args: RasterizeArgs, settings: &Settings) -> Result<(), AppError> {
    let chain = build_rasterize_chain(&args.vector, &args.output, &args.column)?;
    emit_chain(&chain, &args.target, settings)
}

fn handle_aggregate(args: AggregateArgs, settings: &Settings) -> Result<(), AppError> {
    let chain = build_aggregate_chain(args.inputs.as_slice(), &args.output)?;
    emit_chain(&chain, &args.target, settings)
}

fn handle_workspace(args: WorkspaceArgs, settings: &Settings) -> Result<(), AppError> {
    let location = args.location.unwrap_or_else(|| location_name(args.epsg));
    let client = EngineClient::new(&settings.engine)?;
    client.ensure_location_and_mapset(&location, &args.mapset, args.epsg)?;
    println!("{location}/{}", args.mapset);
    Ok(())
}

fn emit_chain(chain: &ProcessChain, target: &SubmitArgs, settings: &Settings) -> Result<(), AppError> {
    match (target.submit, target.location.as_deref(), target.mapset.as_deref()) {
        (true, Some(location), Some(mapset)) => {
            let client = EngineClient::new(&settings.engine)?;
            let receipt = client.submit_chain(location, mapset, chain)?;
            let text = serde_json::to_string_pretty(&receipt)
                .map_err(|e| AppError::engine(format!("Failed to encode engine receipt: {e}")))?;
            println!("{text}");
        }
        (true, _, _) => {
            return Err(AppError::invalid_argument("--submit needs both --location and --mapset."));
        }
        (false, _, _) => println!("{}", chain.to_json_pretty()?),
    }
    Ok(())
}

pub fn buffer_config_from_args(args: &BufferArgs, settings: &Settings) -> Result<pipeline::BufferConfig, AppError> {
    let mut candidates = FieldCandidates::default();
    if !args.height_fields.is_empty() {
        candidates.height = args.height_fields.clone();
    }
    if !args.slope_fields.is_empty() {
        candidates.slope = args.slope_fields.clone();
    }

    Ok(pipeline::BufferConfig {
        input: args.input.clone(),
        candidates,
        epsg_override: args.epsg,
        params: BufferParams::new(args.step, args.min_area, args.max_rings)?,
        data_root: args.output_root.clone().unwrap_or_else(|| settings.data_root.clone()),
        user: args.user.clone(),
        location: args.location.clone(),
        mapset: args.mapset.clone(),
    })
}
