//! Output column layout derived from the feature catalogue.

use super::{FeatureDef, FeatureKind};

/// Dense column index into a polygon's feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(usize);

impl FeatureId {
    /// Position of the column in every feature row.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct KindSlots {
    count: Option<FeatureId>,
    length: Option<FeatureId>,
    area: Option<FeatureId>,
}

impl KindSlots {
    const fn get(&self, kind: FeatureKind) -> Option<FeatureId> {
        match kind {
            FeatureKind::Count => self.count,
            FeatureKind::Length => self.length,
            FeatureKind::Area => self.area,
        }
    }

    const fn set(&mut self, kind: FeatureKind, id: FeatureId) {
        match kind {
            FeatureKind::Count => self.count = Some(id),
            FeatureKind::Length => self.length = Some(id),
            FeatureKind::Area => self.area = Some(id),
        }
    }
}

/// Ordered list of output columns named `<feature>_<kind>`.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Vec<String>,
    slots: Vec<KindSlots>,
}

impl FeatureSchema {
    pub(super) fn from_features(features: &[FeatureDef]) -> Self {
        let mut names = Vec::new();
        let mut slots = Vec::with_capacity(features.len());
        for def in features {
            let mut kinds = def.kinds.to_vec();
            kinds.sort_unstable();
            kinds.dedup();
            let mut slot = KindSlots::default();
            for kind in kinds {
                slot.set(kind, FeatureId(names.len()));
                names.push(format!("{}_{}", def.name, kind.suffix()));
            }
            slots.push(slot);
        }
        Self { names, slots }
    }

    pub(super) fn column(&self, feature: usize, kind: FeatureKind) -> Option<FeatureId> {
        self.slots.get(feature).and_then(|slot| slot.get(kind))
    }

    /// Number of columns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the schema has no columns.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column name for `id`.
    #[must_use]
    pub fn name(&self, id: FeatureId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    /// Look up a column by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<FeatureId> {
        self.names.iter().position(|n| n == name).map(FeatureId)
    }

    /// Iterate over `(id, name)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (FeatureId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (FeatureId(i), name.as_str()))
    }
}
