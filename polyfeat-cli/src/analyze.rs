//! Analyze command implementation for the polyfeat CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use polyfeat_data::{AnalyzeReport, DEFAULT_MAX_NODES_PER_CELL, ElementSource, OsmPbfSource};
use serde::{Deserialize, Serialize};

use crate::{ARG_MAX_NODES_PER_CELL, ARG_OSM_PBF, CliError, ENV_ANALYZE_OSM_PBF, require_file};

/// CLI arguments for the `analyze` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream an OSM PBF extract once and report element counts, \
                 the node bounding box, centroid and spread, and the grid \
                 batch mode would derive from them.",
    about = "Profile an OSM extract"
)]
#[ortho_config(prefix = "POLYFEAT")]
pub(crate) struct AnalyzeArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Upper bound on nodes per grid cell.
    #[arg(long = ARG_MAX_NODES_PER_CELL, value_name = "n")]
    #[serde(default)]
    pub(crate) max_nodes_per_cell: Option<u64>,
}

/// Resolved `analyze` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnalyzeConfig {
    pub(crate) osm_pbf: Utf8PathBuf,
    pub(crate) max_nodes_per_cell: u64,
}

impl TryFrom<AnalyzeArgs> for AnalyzeConfig {
    type Error = CliError;

    fn try_from(args: AnalyzeArgs) -> Result<Self, Self::Error> {
        let osm_pbf = args.osm_pbf.ok_or(CliError::MissingArgument {
            field: ARG_OSM_PBF,
            env: ENV_ANALYZE_OSM_PBF,
        })?;
        Ok(Self {
            osm_pbf,
            max_nodes_per_cell: args
                .max_nodes_per_cell
                .unwrap_or(DEFAULT_MAX_NODES_PER_CELL),
        })
    }
}

pub(crate) fn run_analyze(args: AnalyzeArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = AnalyzeConfig::try_from(merged)?;
    require_file(&config.osm_pbf, ARG_OSM_PBF)?;
    let source = OsmPbfSource::new(config.osm_pbf.as_std_path());
    run_analyze_with(&config, &source, writer).map(|_| ())
}

/// Profile `source` and write the report to `writer`.
pub(crate) fn run_analyze_with(
    config: &AnalyzeConfig,
    source: &dyn ElementSource,
    writer: &mut dyn Write,
) -> Result<AnalyzeReport, CliError> {
    let report = polyfeat_data::analyze(source, config.max_nodes_per_cell)?;
    writeln!(writer, "{report}").map_err(CliError::WriteReport)?;
    writer.flush().map_err(CliError::WriteReport)?;
    Ok(report)
}
