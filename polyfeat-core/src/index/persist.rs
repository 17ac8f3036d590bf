//! On-disk format for the polygon spatial index.
//!
//! Layout: the `PFRT` magic, a little-endian `u16` version, then a `bincode`
//! payload with the [`DatasetIdentity`] the index was built for and its
//! entries.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use bincode::{deserialize_from, serialize_into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{IndexEntry, SpatialIndex};

/// File identifier for persisted polygon indices.
pub const SPATIAL_INDEX_MAGIC: [u8; 4] = *b"PFRT";

/// Supported version of the persisted format.
pub const SPATIAL_INDEX_VERSION: u16 = 1;

/// Identity of the target polygon set an index was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIdentity {
    /// File stem of the polygon dataset.
    pub stem: String,
    /// Number of polygons loaded from it.
    pub polygons: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    identity: DatasetIdentity,
    entries: Vec<IndexEntry>,
}

/// Error emitted when loading or validating a persisted index.
#[derive(Debug, Error)]
pub enum SpatialIndexError {
    /// The index file could not be read.
    #[error("failed to read spatial index from {path}: {source}")]
    Io {
        /// Location of the index file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The payload could not be decoded.
    #[error("failed to decode spatial index from {path}: {source}")]
    Decode {
        /// Location of the index file.
        path: PathBuf,
        /// Decoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The file did not start with the expected header.
    #[error("invalid spatial index magic in {path}: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Location of the index file.
        path: PathBuf,
        /// Expected byte sequence.
        expected: [u8; 4],
        /// Sequence read from the file.
        found: [u8; 4],
    },
    /// The file uses an unsupported format version.
    #[error("unsupported spatial index version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version present in the file header.
        found: u16,
        /// Version written by this binary.
        supported: u16,
    },
}

/// Error emitted when serialising an index to disk.
#[derive(Debug, Error)]
pub enum SpatialIndexWriteError {
    /// Writing bytes failed.
    #[error("failed to write spatial index to {path}: {source}")]
    Io {
        /// Destination file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The payload could not be encoded.
    #[error("failed to encode spatial index for {path}: {source}")]
    Encode {
        /// Destination file path.
        path: PathBuf,
        /// Encoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
}

/// Persist `index` for the dataset described by `identity`, truncating any
/// existing file.
#[expect(
    clippy::little_endian_bytes,
    reason = "the header version is stored little-endian"
)]
pub fn write_spatial_index(
    path: &Path,
    identity: &DatasetIdentity,
    index: &SpatialIndex,
) -> Result<(), SpatialIndexWriteError> {
    let io_err = |source| SpatialIndexWriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&SPATIAL_INDEX_MAGIC).map_err(io_err)?;
    writer
        .write_all(&SPATIAL_INDEX_VERSION.to_le_bytes())
        .map_err(io_err)?;
    let payload = Payload {
        identity: identity.clone(),
        entries: index.entries(),
    };
    serialize_into(&mut writer, &payload).map_err(|source| SpatialIndexWriteError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let file = writer
        .into_inner()
        .map_err(|err| io_err(err.into_error()))?;
    file.sync_all().map_err(io_err)
}

/// Load a persisted index together with the identity it was built for.
#[expect(
    clippy::little_endian_bytes,
    reason = "the header version is stored little-endian"
)]
pub fn load_spatial_index(
    path: &Path,
) -> Result<(DatasetIdentity, SpatialIndex), SpatialIndexError> {
    let io_err = |source| SpatialIndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut magic = [0_u8; 4];
    reader.read_exact(&mut magic).map_err(io_err)?;
    if magic != SPATIAL_INDEX_MAGIC {
        return Err(SpatialIndexError::InvalidMagic {
            path: path.to_path_buf(),
            expected: SPATIAL_INDEX_MAGIC,
            found: magic,
        });
    }

    let mut version_bytes = [0_u8; 2];
    reader.read_exact(&mut version_bytes).map_err(io_err)?;
    let version = u16::from_le_bytes(version_bytes);
    if version != SPATIAL_INDEX_VERSION {
        return Err(SpatialIndexError::UnsupportedVersion {
            found: version,
            supported: SPATIAL_INDEX_VERSION,
        });
    }

    let payload: Payload =
        deserialize_from(&mut reader).map_err(|source| SpatialIndexError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((payload.identity, SpatialIndex::from_entries(payload.entries)))
}
