//! Test helpers for composing CLI workspaces and layered overrides.

use super::*;
use crate::extract::{ExtractArgs, ExtractConfig};
use camino::{Utf8Path, Utf8PathBuf};
use polyfeat_data::MemorySource;
use tempfile::TempDir;

/// Two adjacent cells sharing the meridian at 0.01.
pub(super) const TWO_CELLS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "id": "west", "properties": {"name": "West"},
     "geometry": {"type": "Polygon",
                  "coordinates": [[[0,0],[0.01,0],[0.01,0.01],[0,0.01],[0,0]]]}},
    {"type": "Feature", "id": "east", "properties": {"name": "East"},
     "geometry": {"type": "Polygon",
                  "coordinates": [[[0.01,0],[0.02,0],[0.02,0.01],[0.01,0.01],[0.01,0]]]}},
    {"type": "Feature", "id": "marker", "properties": {},
     "geometry": {"type": "Point", "coordinates": [0.005, 0.005]}}
  ]
}"#;

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
}

/// Temporary directory holding an extract placeholder and target polygons.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        let workspace = Self { _dir: dir, root };
        write_utf8(&workspace.osm(), b"osm placeholder");
        write_utf8(&workspace.polygons(), TWO_CELLS.as_bytes());
        write_utf8(&workspace.path("config.osm.pbf"), b"osm placeholder");
        write_utf8(&workspace.path("env.geojson"), TWO_CELLS.as_bytes());
        workspace
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn osm(&self) -> Utf8PathBuf {
        self.path("town.osm.pbf")
    }

    pub(super) fn polygons(&self) -> Utf8PathBuf {
        self.path("cells.geojson")
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.path("out/cells.enriched.geojson")
    }

    pub(super) fn work_dir(&self) -> Utf8PathBuf {
        self.path("work")
    }

    /// Fully specified configuration with default processing options.
    pub(super) fn config(&self) -> ExtractConfig {
        ExtractConfig::try_from(ExtractArgs {
            osm_pbf: Some(self.osm()),
            polygons: Some(self.polygons()),
            output: Some(self.output()),
            work_dir: Some(self.work_dir()),
            ..ExtractArgs::default()
        })
        .expect("complete arguments")
    }
}

/// A bakery in the west cell and a street crossing into the east cell.
pub(super) fn town() -> MemorySource {
    MemorySource::new("town")
        .node(1, 0.005, 0.005, &[("shop", "bakery")])
        .node(2, 0.004, 0.002, &[])
        .node(3, 0.018, 0.002, &[])
        .way(10, &[2, 3], &[("highway", "residential")])
}

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) osm_pbf: Option<Utf8PathBuf>,
    pub(super) polygons: Option<Utf8PathBuf>,
    pub(super) output: Option<Utf8PathBuf>,
}

/// Apply environment then file values beneath the CLI arguments.
pub(super) fn merge_layers(
    mut cli_args: ExtractArgs,
    file_layer: Option<&LayerOverrides>,
    env_layer: Option<&LayerOverrides>,
) -> Result<ExtractConfig, CliError> {
    merge_field(
        &mut cli_args.osm_pbf,
        env_layer.and_then(|layer| layer.osm_pbf.clone()),
        file_layer.and_then(|layer| layer.osm_pbf.clone()),
    );
    merge_field(
        &mut cli_args.polygons,
        env_layer.and_then(|layer| layer.polygons.clone()),
        file_layer.and_then(|layer| layer.polygons.clone()),
    );
    merge_field(
        &mut cli_args.output,
        env_layer.and_then(|layer| layer.output.clone()),
        file_layer.and_then(|layer| layer.output.clone()),
    );
    let config = ExtractConfig::try_from(cli_args)?;
    config.validate_sources()?;
    Ok(config)
}

fn merge_field<T>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}
