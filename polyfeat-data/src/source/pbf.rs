//! `osmpbf`-backed element source.

use std::path::{Path, PathBuf};

use osmpbf::{Element, ElementReader};
use polyfeat_core::{RawNode, RawWay};

use super::{ElementSource, OsmElement, SourceError, collect_tags, validated_coord};
use crate::analyze::DatasetProfile;

/// Streams an `.osm.pbf` file from disk.
///
/// Every stream reopens the file, so passes and cells never share reader
/// state.
#[derive(Debug, Clone)]
pub struct OsmPbfSource {
    path: PathBuf,
}

impl OsmPbfSource {
    /// Source reading `path`. The file is opened lazily on each stream.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Dataset path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<ElementReader<std::io::BufReader<std::fs::File>>, SourceError> {
        ElementReader::from_path(&self.path).map_err(|source| SourceError::Open {
            source: Box::new(source),
            path: self.path.clone(),
        })
    }

    fn decode_error(&self, source: osmpbf::Error) -> SourceError {
        SourceError::Decode {
            source: Box::new(source),
            path: self.path.clone(),
        }
    }
}

fn node<'a>(
    id: i64,
    lon: f64,
    lat: f64,
    tags: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> OsmElement {
    OsmElement::Node(RawNode {
        id,
        location: validated_coord(lon, lat),
        tags: collect_tags(tags),
    })
}

fn convert(element: Element<'_>) -> OsmElement {
    match element {
        Element::Node(n) => node(n.id(), n.lon(), n.lat(), n.tags()),
        Element::DenseNode(n) => node(n.id(), n.lon(), n.lat(), n.tags()),
        Element::Way(way) => OsmElement::Way(RawWay {
            id: way.id(),
            node_refs: way.refs().collect(),
            tags: collect_tags(way.tags()),
        }),
        Element::Relation(relation) => OsmElement::Relation(relation.id()),
    }
}

fn profile_element(element: Element<'_>) -> DatasetProfile {
    let mut profile = DatasetProfile::default();
    match element {
        Element::Node(n) => profile.record_node(validated_coord(n.lon(), n.lat())),
        Element::DenseNode(n) => profile.record_node(validated_coord(n.lon(), n.lat())),
        Element::Way(_) => profile.record_way(),
        Element::Relation(_) => profile.record_relation(),
    }
    profile
}

impl ElementSource for OsmPbfSource {
    fn for_each_element(&self, visit: &mut dyn FnMut(OsmElement)) -> Result<(), SourceError> {
        self.reader()?
            .for_each(|element| visit(convert(element)))
            .map_err(|source| self.decode_error(source))
    }

    fn profile(&self) -> Result<DatasetProfile, SourceError> {
        self.reader()?
            .par_map_reduce(profile_element, DatasetProfile::default, DatasetProfile::combine)
            .map_err(|source| self.decode_error(source))
    }

    fn name(&self) -> String {
        self.path
            .file_stem()
            .map_or_else(|| self.path.display().to_string(), |stem| stem.to_string_lossy().into_owned())
    }
}
