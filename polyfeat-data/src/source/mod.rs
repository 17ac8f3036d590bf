//! Streamed OSM element sources.
//!
//! A source replays the same dataset in file order every time it is
//! streamed, which is what lets the extractor make a second pass or one
//! pass per batch cell. Relations are surfaced only so they can be counted.

use std::path::PathBuf;

use geo::Coord;
use polyfeat_core::{RawNode, RawWay, Tags};
use thiserror::Error;

use crate::analyze::DatasetProfile;

mod memory;
#[cfg(feature = "pbf")]
mod pbf;

pub use memory::MemorySource;
#[cfg(feature = "pbf")]
pub use pbf::OsmPbfSource;

/// One element of the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum OsmElement {
    /// Node or dense node.
    Node(RawNode),
    /// Way.
    Way(RawWay),
    /// Relation, identified only by id.
    Relation(i64),
}

/// Errors raised while streaming a dataset.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The dataset could not be opened.
    #[error("failed to open OSM dataset at {path:?}")]
    Open {
        /// Underlying reader error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Dataset path.
        path: PathBuf,
    },
    /// The dataset could not be decoded.
    #[error("failed to decode OSM dataset at {path:?}")]
    Decode {
        /// Underlying reader error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Dataset path.
        path: PathBuf,
    },
}

/// A replayable stream of OSM elements.
pub trait ElementSource: Sync {
    /// Stream every element in file order.
    fn for_each_element(&self, visit: &mut dyn FnMut(OsmElement)) -> Result<(), SourceError>;

    /// One-pass statistics over the whole dataset.
    fn profile(&self) -> Result<DatasetProfile, SourceError> {
        let mut profile = DatasetProfile::default();
        self.for_each_element(&mut |element| profile.record(&element))?;
        Ok(profile)
    }

    /// Stem identifying the dataset in log messages.
    fn name(&self) -> String;
}

/// Accept a coordinate only when it is finite and within WGS84 bounds.
#[must_use]
pub fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}

/// Collect borrowed key/value pairs into an owned tag map.
#[must_use]
pub fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}
