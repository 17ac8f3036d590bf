//! Target polygons and the additive accumulator that mutates their features.
//!
//! Every polygon carries one value per schema column, initialised to zero,
//! and an `updated` flag set on its first contribution. Contributions are
//! pure additions of non-negative finite values, so they commute: callers
//! may accumulate into a private [`FeatureDelta`] and merge later in any
//! order.

use std::collections::HashMap;

use geo::MultiPolygon;
use thiserror::Error;

use crate::rules::{FeatureId, FeatureSchema};

/// A region receiving aggregated features.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPolygon {
    /// Stable string identifier.
    pub id: String,
    /// Polygon geometry in longitude/latitude.
    pub geometry: MultiPolygon<f64>,
    features: Vec<f64>,
    updated: bool,
}

impl TargetPolygon {
    /// New polygon with every column of `schema` set to zero.
    #[must_use]
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>, schema: &FeatureSchema) -> Self {
        Self {
            id: id.into(),
            geometry,
            features: vec![0.0; schema.len()],
            updated: false,
        }
    }

    /// Accumulated value of a column.
    #[must_use]
    pub fn value(&self, feature: FeatureId) -> f64 {
        self.features.get(feature.index()).copied().unwrap_or(0.0)
    }

    /// All column values in schema order.
    #[must_use]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Whether any contribution has been applied.
    #[must_use]
    pub const fn updated(&self) -> bool {
        self.updated
    }
}

/// Reasons a contribution is refused.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum AccumulateError {
    /// The value was negative, NaN or infinite.
    #[error("contribution {value} is not a finite non-negative number")]
    InvalidValue {
        /// Refused value.
        value: f64,
    },
    /// No polygon at the slot.
    #[error("no target polygon at slot {slot}")]
    UnknownSlot {
        /// Requested slot.
        slot: usize,
    },
    /// No such column in the schema.
    #[error("feature column {column} is outside the schema")]
    UnknownFeature {
        /// Requested column index.
        column: usize,
    },
}

/// Additive sink for feature contributions.
///
/// Implementations must apply `features[feature] += value` and mark the
/// polygon updated, or refuse the contribution without side effects.
pub trait Accumulator {
    /// Add `value` to `feature` of the polygon at `slot`.
    fn add(&mut self, slot: usize, feature: FeatureId, value: f64) -> Result<(), AccumulateError>;
}

const fn check_value(value: f64) -> Result<(), AccumulateError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AccumulateError::InvalidValue { value })
    }
}

/// The full set of target polygons for a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetPolygonSet {
    polygons: Vec<TargetPolygon>,
    columns: usize,
}

impl TargetPolygonSet {
    /// Wrap loaded polygons; each must share `schema`.
    #[must_use]
    pub fn new(polygons: Vec<TargetPolygon>, schema: &FeatureSchema) -> Self {
        Self {
            polygons,
            columns: schema.len(),
        }
    }

    /// Number of polygons.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Polygon at `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&TargetPolygon> {
        self.polygons.get(slot)
    }

    /// Iterate polygons in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetPolygon> {
        self.polygons.iter()
    }

    /// Geometries in slot order, for index construction.
    pub fn geometries(&self) -> impl Iterator<Item = &MultiPolygon<f64>> {
        self.polygons.iter().map(|polygon| &polygon.geometry)
    }

    /// Number of polygons with at least one contribution.
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.polygons.iter().filter(|p| p.updated).count()
    }

    /// Empty delta sized for this set.
    #[must_use]
    pub fn delta(&self) -> FeatureDelta {
        FeatureDelta::new(self.polygons.len(), self.columns)
    }

    /// Apply every contribution recorded in `delta`.
    pub fn merge(&mut self, delta: FeatureDelta) -> Result<(), AccumulateError> {
        for ((slot, feature), value) in delta.values {
            self.add(slot, feature, value)?;
        }
        Ok(())
    }

    /// Consume the set, returning its polygons in slot order.
    #[must_use]
    pub fn into_polygons(self) -> Vec<TargetPolygon> {
        self.polygons
    }
}

impl<'a> IntoIterator for &'a TargetPolygonSet {
    type Item = &'a TargetPolygon;
    type IntoIter = std::slice::Iter<'a, TargetPolygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.polygons.iter()
    }
}

impl Accumulator for TargetPolygonSet {
    #[expect(
        clippy::float_arithmetic,
        reason = "contributions are summed into feature columns"
    )]
    fn add(&mut self, slot: usize, feature: FeatureId, value: f64) -> Result<(), AccumulateError> {
        check_value(value)?;
        let polygon = self
            .polygons
            .get_mut(slot)
            .ok_or(AccumulateError::UnknownSlot { slot })?;
        let current = polygon
            .features
            .get_mut(feature.index())
            .ok_or(AccumulateError::UnknownFeature {
                column: feature.index(),
            })?;
        *current += value;
        polygon.updated = true;
        Ok(())
    }
}

/// Private, mergeable contributions gathered by one worker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureDelta {
    slots: usize,
    columns: usize,
    values: HashMap<(usize, FeatureId), f64>,
}

impl FeatureDelta {
    /// Empty delta for a set of `slots` polygons and `columns` features.
    #[must_use]
    pub fn new(slots: usize, columns: usize) -> Self {
        Self {
            slots,
            columns,
            values: HashMap::new(),
        }
    }

    /// Value recorded for one cell of the table.
    #[must_use]
    pub fn value(&self, slot: usize, feature: FeatureId) -> f64 {
        self.values.get(&(slot, feature)).copied().unwrap_or(0.0)
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fold another delta into this one.
    #[expect(
        clippy::float_arithmetic,
        reason = "merging deltas sums matching cells"
    )]
    pub fn absorb(&mut self, other: Self) {
        for (key, value) in other.values {
            *self.values.entry(key).or_insert(0.0) += value;
        }
    }
}

impl Accumulator for FeatureDelta {
    #[expect(
        clippy::float_arithmetic,
        reason = "contributions are summed into feature cells"
    )]
    fn add(&mut self, slot: usize, feature: FeatureId, value: f64) -> Result<(), AccumulateError> {
        check_value(value)?;
        if slot >= self.slots {
            return Err(AccumulateError::UnknownSlot { slot });
        }
        if feature.index() >= self.columns {
            return Err(AccumulateError::UnknownFeature {
                column: feature.index(),
            });
        }
        *self.values.entry((slot, feature)).or_insert(0.0) += value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TagRuleTable;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn rules() -> TagRuleTable {
        TagRuleTable::default()
    }

    fn set(rules: &TagRuleTable, count: usize) -> TargetPolygonSet {
        let polygons = (0..count)
            .map(|i| TargetPolygon::new(i.to_string(), MultiPolygon::new(Vec::new()), rules.schema()))
            .collect();
        TargetPolygonSet::new(polygons, rules.schema())
    }

    fn column(rules: &TagRuleTable, name: &str) -> FeatureId {
        rules.schema().id_of(name).expect("column exists")
    }

    #[rstest]
    fn polygons_start_zeroed_and_not_updated(rules: TagRuleTable) {
        let targets = set(&rules, 2);
        for polygon in &targets {
            assert!(!polygon.updated());
            assert_eq!(polygon.features().len(), rules.schema().len());
            assert!(polygon.features().iter().all(|v| *v == 0.0));
        }
    }

    #[rstest]
    fn add_increments_and_marks_updated(rules: TagRuleTable) {
        let mut targets = set(&rules, 2);
        let bakery = column(&rules, "shop_bakery_count");
        targets.add(1, bakery, 1.0).expect("valid contribution");
        targets.add(1, bakery, 1.0).expect("valid contribution");
        let polygon = targets.get(1).expect("slot 1");
        assert_eq!(polygon.value(bakery), 2.0);
        assert!(polygon.updated());
        assert!(!targets.get(0).expect("slot 0").updated());
        assert_eq!(targets.updated_count(), 1);
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn invalid_values_are_refused(rules: TagRuleTable, #[case] value: f64) {
        let mut targets = set(&rules, 1);
        let bakery = column(&rules, "shop_bakery_count");
        let result = targets.add(0, bakery, value);
        assert!(matches!(result, Err(AccumulateError::InvalidValue { .. })));
        assert!(!targets.get(0).expect("slot 0").updated());
    }

    #[rstest]
    fn unknown_slot_is_refused(rules: TagRuleTable) {
        let mut targets = set(&rules, 1);
        let bakery = column(&rules, "shop_bakery_count");
        assert_eq!(
            targets.add(5, bakery, 1.0),
            Err(AccumulateError::UnknownSlot { slot: 5 })
        );
        let mut delta = targets.delta();
        assert_eq!(
            delta.add(5, bakery, 1.0),
            Err(AccumulateError::UnknownSlot { slot: 5 })
        );
    }

    #[rstest]
    fn deltas_merge_in_any_order(rules: TagRuleTable) {
        let length = column(&rules, "highway_residential_length");
        let mut first = set(&rules, 2);
        let mut second = first.clone();

        let mut a = first.delta();
        a.add(0, length, 12.5).expect("valid");
        let mut b = first.delta();
        b.add(0, length, 7.5).expect("valid");
        b.add(1, length, 3.0).expect("valid");

        first.merge(a.clone()).expect("merge a");
        first.merge(b.clone()).expect("merge b");
        b.absorb(a);
        second.merge(b).expect("merge combined");

        assert_eq!(first, second);
        assert_eq!(first.get(0).expect("slot 0").value(length), 20.0);
    }

    proptest! {
        #[test]
        fn contribution_order_does_not_change_sums(
            contributions in prop::collection::vec((0..3_usize, 0..1000_u16), 0..40),
            split in 0..40_usize,
        ) {
            let rules = TagRuleTable::default();
            let length = column(&rules, "highway_residential_length");
            let mut forward = set(&rules, 3);
            let mut split_run = forward.clone();

            for &(slot, value) in &contributions {
                forward.add(slot, length, f64::from(value)).expect("valid");
            }

            let (head, tail) = contributions.split_at(split.min(contributions.len()));
            let mut first = split_run.delta();
            for &(slot, value) in tail.iter().rev() {
                first.add(slot, length, f64::from(value)).expect("valid");
            }
            let mut second = split_run.delta();
            for &(slot, value) in head {
                second.add(slot, length, f64::from(value)).expect("valid");
            }
            first.absorb(second);
            split_run.merge(first).expect("merge");

            for slot in 0..3 {
                prop_assert_eq!(
                    forward.get(slot).map(|p| p.value(length)),
                    split_run.get(slot).map(|p| p.value(length))
                );
            }
            prop_assert_eq!(forward.updated_count(), split_run.updated_count());
        }
    }
}
