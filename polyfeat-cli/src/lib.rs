//! Command-line interface for the polyfeat extractor.
//!
//! Two subcommands are provided:
//!
//! - `extract` aggregates an OSM PBF extract onto a GeoJSON collection of
//!   target polygons, or onto one polygon covering the globe, and writes the
//!   enriched collection.
//! - `analyze` profiles an OSM PBF extract and reports the grid batch mode
//!   would use for it.
//!
//! Options layer configuration files, `POLYFEAT_*` environment variables and
//! CLI flags through `ortho_config`.
#![forbid(unsafe_code)]

use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod analyze;
mod error;
mod extract;

pub use error::CliError;

pub(crate) const ARG_OSM_PBF: &str = "osm-pbf";
pub(crate) const ARG_POLYGONS: &str = "polygons";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ARG_WORK_DIR: &str = "work-dir";
pub(crate) const ARG_REBUILD_INDEX: &str = "rebuild-index";
pub(crate) const ARG_SINGLE_PASS: &str = "single-pass";
pub(crate) const ARG_BATCHED: &str = "batched";
pub(crate) const ARG_MAX_NODES_PER_CELL: &str = "max-nodes-per-cell";
pub(crate) const ARG_PARALLEL_CELLS: &str = "parallel-cells";
pub(crate) const ARG_NODE_CACHE_CAPACITY: &str = "node-cache-capacity";
pub(crate) const ENV_EXTRACT_OSM_PBF: &str = "POLYFEAT_CMDS_EXTRACT_OSM_PBF";
pub(crate) const ENV_EXTRACT_OUTPUT: &str = "POLYFEAT_CMDS_EXTRACT_OUTPUT";
pub(crate) const ENV_ANALYZE_OSM_PBF: &str = "POLYFEAT_CMDS_ANALYZE_OSM_PBF";

/// Working directory used when none is configured.
pub const DEFAULT_WORK_DIR: &str = "polyfeat_work";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => extract::run_extract(args).map(|_| ()),
        Command::Analyze(args) => {
            let mut stdout = std::io::stdout().lock();
            analyze::run_analyze(args, &mut stdout)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "polyfeat",
    about = "Aggregate OpenStreetMap features onto target polygons",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate tagged nodes, ways and areas onto target polygons.
    Extract(extract::ExtractArgs),
    /// Profile an extract and report its batch grid.
    Analyze(analyze::AnalyzeArgs),
}

/// Check that `path` names an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match polyfeat_data::fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests;
