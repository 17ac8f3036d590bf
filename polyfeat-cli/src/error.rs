//! Error types emitted by the polyfeat CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use polyfeat_data::{
    ExtractError, IndexPreparationError, PolygonLoadError, PolygonWriteError, SourceError,
};
use thiserror::Error;

/// Errors emitted by the polyfeat CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable carrying the same setting.
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The target polygon collection could not be loaded.
    #[error(transparent)]
    LoadPolygons(#[from] PolygonLoadError),
    /// The spatial index could not be built, loaded or validated.
    #[error(transparent)]
    PrepareIndex(#[from] IndexPreparationError),
    /// Streaming or accumulation failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The enriched collection could not be written.
    #[error(transparent)]
    WriteOutput(#[from] PolygonWriteError),
    /// Profiling the extract failed.
    #[error(transparent)]
    Analyze(#[from] SourceError),
    /// Writing the analysis report failed.
    #[error("failed to write analysis report: {0}")]
    WriteReport(#[source] std::io::Error),
}

impl CliError {
    /// Name of the stage that failed, used in the process error line.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::ArgumentParsing(_)
            | Self::Configuration(_)
            | Self::MissingArgument { .. }
            | Self::MissingSourceFile { .. }
            | Self::SourcePathNotFile { .. }
            | Self::InspectSourcePath { .. } => "configuration",
            Self::LoadPolygons(_) => "load polygons",
            Self::PrepareIndex(_) => "prepare index",
            Self::Extract(_) => "extract",
            Self::WriteOutput(_) => "write output",
            Self::Analyze(_) | Self::WriteReport(_) => "analyze",
        }
    }
}
