//! Extract command implementation for the polyfeat CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use polyfeat_core::{DatasetIdentity, FeatureSchema, GeoEngine, TagRuleTable};
use polyfeat_data::{
    BatchOptions, DEFAULT_MAX_NODES_PER_CELL, DEFAULT_NODE_CACHE_CAPACITY, ElementSource,
    ExtractOptions, ExtractReport, OsmPbfSource, PassMode, PolygonLayer, WORLD_STEM, extract,
    load_polygons, prepare_index, world_layer, write_polygons,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BATCHED, ARG_MAX_NODES_PER_CELL, ARG_NODE_CACHE_CAPACITY, ARG_OSM_PBF, ARG_OUTPUT,
    ARG_PARALLEL_CELLS, ARG_POLYGONS, ARG_REBUILD_INDEX, ARG_SINGLE_PASS, ARG_WORK_DIR, CliError,
    DEFAULT_WORK_DIR, ENV_EXTRACT_OSM_PBF, ENV_EXTRACT_OUTPUT, require_file,
};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream an OSM PBF extract and add the counts, lengths and \
                 areas of tagged objects to every target polygon they fall \
                 in. Paths can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Aggregate OSM features onto target polygons"
)]
#[ortho_config(prefix = "POLYFEAT")]
pub(crate) struct ExtractArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Path to the GeoJSON FeatureCollection of target polygons. Without it
    /// a single polygon covering the whole globe is used.
    #[arg(long = ARG_POLYGONS, value_name = "path")]
    #[serde(default)]
    pub(crate) polygons: Option<Utf8PathBuf>,
    /// Path of the enriched GeoJSON output.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Directory holding the persisted spatial index.
    #[arg(long = ARG_WORK_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) work_dir: Option<Utf8PathBuf>,
    /// Rebuild the spatial index even when one exists.
    #[arg(long = ARG_REBUILD_INDEX)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) rebuild_index: bool,
    /// Drop ways with unresolved nodes instead of making a second pass.
    #[arg(long = ARG_SINGLE_PASS)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) single_pass: bool,
    /// Process the extract in bounded-memory grid cells.
    #[arg(long = ARG_BATCHED)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) batched: bool,
    /// Upper bound on nodes per grid cell in batch mode.
    #[arg(long = ARG_MAX_NODES_PER_CELL, value_name = "n")]
    #[serde(default)]
    pub(crate) max_nodes_per_cell: Option<u64>,
    /// Process grid cells in parallel.
    #[arg(long = ARG_PARALLEL_CELLS)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) parallel_cells: bool,
    /// Node locations cached during the first pass.
    #[arg(long = ARG_NODE_CACHE_CAPACITY, value_name = "n")]
    #[serde(default)]
    pub(crate) node_cache_capacity: Option<usize>,
}

impl ExtractArgs {
    pub(crate) fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractConfig {
    pub(crate) osm_pbf: Utf8PathBuf,
    pub(crate) polygons: Option<Utf8PathBuf>,
    pub(crate) output: Utf8PathBuf,
    pub(crate) work_dir: Utf8PathBuf,
    pub(crate) rebuild_index: bool,
    pub(crate) options: ExtractOptions,
}

impl ExtractConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_file(&self.osm_pbf, ARG_OSM_PBF)?;
        if let Some(polygons) = &self.polygons {
            require_file(polygons, ARG_POLYGONS)?;
        }
        Ok(())
    }

    /// Identity recorded in the spatial index for `polygons` loaded polygons.
    pub(crate) fn identity(&self, polygons: usize) -> DatasetIdentity {
        DatasetIdentity {
            stem: self
                .polygons
                .as_deref()
                .map_or_else(|| WORLD_STEM.to_owned(), dataset_stem),
            polygons,
        }
    }

    /// Target polygons from the configured file, or the world polygon.
    pub(crate) fn load_layer(&self, schema: &FeatureSchema) -> Result<PolygonLayer, CliError> {
        match &self.polygons {
            Some(path) => Ok(load_polygons(path, schema)?),
            None => {
                info!("No target polygons configured; aggregating onto the whole globe");
                Ok(world_layer(schema))
            }
        }
    }
}

fn dataset_stem(path: &Utf8Path) -> String {
    path.file_stem().unwrap_or("polygons").to_owned()
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        let osm_pbf = args.osm_pbf.ok_or(CliError::MissingArgument {
            field: ARG_OSM_PBF,
            env: ENV_EXTRACT_OSM_PBF,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_EXTRACT_OUTPUT,
        })?;
        let work_dir = args
            .work_dir
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_WORK_DIR));
        let batching = args.batched.then(|| BatchOptions {
            max_nodes_per_cell: args
                .max_nodes_per_cell
                .unwrap_or(DEFAULT_MAX_NODES_PER_CELL),
            parallel: args.parallel_cells,
        });
        let pass_mode = if args.single_pass {
            PassMode::Single
        } else {
            PassMode::Two
        };
        Ok(Self {
            osm_pbf,
            polygons: args.polygons,
            output,
            work_dir,
            rebuild_index: args.rebuild_index,
            options: ExtractOptions {
                pass_mode,
                batching,
                node_cache_capacity: args
                    .node_cache_capacity
                    .unwrap_or(DEFAULT_NODE_CACHE_CAPACITY),
            },
        })
    }
}

pub(crate) fn run_extract(args: ExtractArgs) -> Result<ExtractReport, CliError> {
    let config = resolve_extract_config(args)?;
    let source = OsmPbfSource::new(config.osm_pbf.as_std_path());
    run_extract_with(&config, &source)
}

pub(crate) fn resolve_extract_config(args: ExtractArgs) -> Result<ExtractConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Load, index, extract and write, reading elements from `source`.
pub(crate) fn run_extract_with(
    config: &ExtractConfig,
    source: &dyn ElementSource,
) -> Result<ExtractReport, CliError> {
    let rules = TagRuleTable::default();
    let mut layer = config.load_layer(rules.schema())?;
    let identity = config.identity(layer.targets().len());
    let index = prepare_index(
        &config.work_dir,
        &identity,
        layer.targets(),
        config.rebuild_index,
    )?;
    let mut report = extract(
        source,
        &rules,
        layer.targets_mut(),
        &index,
        &GeoEngine,
        &config.options,
    )?;
    report.record_skipped(layer.skipped());
    layer.set_coverage_area(report.coverage_area_km2);
    write_polygons(&config.output, &layer, rules.schema())?;
    info!("Wrote {} ({report})", config.output);
    Ok(report)
}
