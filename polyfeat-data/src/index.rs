//! Spatial index preparation in the working directory.
//!
//! The index for `<stem>.geojson` lives at `<work_dir>/<stem>_rtree.idx`. It
//! is rebuilt when missing or when a rebuild is requested, and otherwise
//! loaded and checked against the identity of the current polygon set.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use polyfeat_core::{
    DatasetIdentity, SpatialIndex, SpatialIndexError, SpatialIndexWriteError, TargetPolygonSet,
    load_spatial_index, write_spatial_index,
};
use thiserror::Error;

use crate::fs;

/// Suffix appended to the polygon file stem to name the index artefact.
pub const INDEX_SUFFIX: &str = "_rtree.idx";

/// Errors raised while preparing the spatial index.
#[derive(Debug, Error)]
pub enum IndexPreparationError {
    /// The working directory could not be created or inspected.
    #[error("failed to prepare working directory {path}")]
    WorkDir {
        /// Working directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// An existing index could not be loaded.
    #[error(transparent)]
    Load(#[from] SpatialIndexError),
    /// A fresh index could not be persisted.
    #[error(transparent)]
    Write(#[from] SpatialIndexWriteError),
    /// The persisted index belongs to a different polygon set.
    #[error(
        "spatial index {path} was built for {found_stem} ({found} polygons) but {expected_stem} \
         has {expected} polygons; rebuild the index"
    )]
    Stale {
        /// Index path.
        path: Utf8PathBuf,
        /// Stem of the current polygon file.
        expected_stem: String,
        /// Current polygon count.
        expected: usize,
        /// Stem recorded in the index.
        found_stem: String,
        /// Polygon count recorded in the index.
        found: usize,
    },
}

/// Path of the index artefact for the polygon dataset named `stem`.
#[must_use]
pub fn index_path(work_dir: &Utf8Path, stem: &str) -> Utf8PathBuf {
    work_dir.join(format!("{stem}{INDEX_SUFFIX}"))
}

/// Load the index for `targets` from `work_dir`, building and persisting it
/// first when absent or when `rebuild` is set.
pub fn prepare_index(
    work_dir: &Utf8Path,
    identity: &DatasetIdentity,
    targets: &TargetPolygonSet,
    rebuild: bool,
) -> Result<SpatialIndex, IndexPreparationError> {
    let work_dir_err = |source| IndexPreparationError::WorkDir {
        path: work_dir.to_owned(),
        source,
    };
    fs::create_dir_all(work_dir).map_err(work_dir_err)?;
    let path = index_path(work_dir, &identity.stem);
    let exists = fs::is_file(&path).map_err(work_dir_err)?;

    if rebuild || !exists {
        let index = SpatialIndex::from_polygons(targets.geometries());
        write_spatial_index(path.as_std_path(), identity, &index)?;
        info!("Built spatial index over {} polygons at {path}", index.len());
        return Ok(index);
    }

    let (found, index) = load_spatial_index(path.as_std_path())?;
    if found != *identity {
        return Err(IndexPreparationError::Stale {
            path,
            expected_stem: identity.stem.clone(),
            expected: identity.polygons,
            found_stem: found.stem,
            found: found.polygons,
        });
    }
    debug!("Loaded spatial index with {} entries from {path}", index.len());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfeat_core::TagRuleTable;
    use polyfeat_core::test_support::{rectangle, target_set};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Workspace {
        _temp: TempDir,
        dir: Utf8PathBuf,
        targets: TargetPolygonSet,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let temp = TempDir::new().expect("temp dir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("work")).expect("utf-8 temp dir");
        let rules = TagRuleTable::default();
        let targets = target_set(
            &rules,
            &[
                ("a", rectangle(0.0, 0.0, 1.0, 1.0)),
                ("b", rectangle(1.0, 0.0, 2.0, 1.0)),
            ],
        );
        Workspace {
            _temp: temp,
            dir,
            targets,
        }
    }

    fn identity(polygons: usize) -> DatasetIdentity {
        DatasetIdentity {
            stem: "cells".to_owned(),
            polygons,
        }
    }

    #[rstest]
    fn builds_then_reuses_index(workspace: Workspace) {
        let built = prepare_index(&workspace.dir, &identity(2), &workspace.targets, false)
            .expect("build");
        assert!(index_path(&workspace.dir, "cells").as_std_path().is_file());

        let loaded = prepare_index(&workspace.dir, &identity(2), &workspace.targets, false)
            .expect("load");
        assert_eq!(built.len(), loaded.len());
        assert_eq!(loaded.len(), 2);
    }

    #[rstest]
    fn mismatched_identity_is_stale(workspace: Workspace) {
        prepare_index(&workspace.dir, &identity(2), &workspace.targets, false).expect("build");
        let err = prepare_index(&workspace.dir, &identity(3), &workspace.targets, false)
            .expect_err("stale index");
        assert!(
            matches!(err, IndexPreparationError::Stale { expected: 3, found: 2, .. }),
            "{err:?}"
        );
        assert!(err.to_string().contains("rebuild"));
    }

    #[rstest]
    fn rebuild_replaces_stale_index(workspace: Workspace) {
        prepare_index(&workspace.dir, &identity(2), &workspace.targets, false).expect("build");
        prepare_index(&workspace.dir, &identity(3), &workspace.targets, true).expect("rebuild");
        prepare_index(&workspace.dir, &identity(3), &workspace.targets, false)
            .expect("fresh index matches");
    }

    #[rstest]
    fn corrupt_index_is_a_load_error(workspace: Workspace) {
        fs::create_dir_all(&workspace.dir).expect("work dir");
        std::fs::write(index_path(&workspace.dir, "cells"), b"garbage").expect("write junk");
        let err = prepare_index(&workspace.dir, &identity(2), &workspace.targets, false)
            .expect_err("corrupt index");
        assert!(matches!(err, IndexPreparationError::Load(_)), "{err:?}");
    }
}
