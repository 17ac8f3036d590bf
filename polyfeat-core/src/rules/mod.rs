//! Tag rule table mapping raw OSM tags onto canonical feature names.
//!
//! Rules are declared as static data ([`RuleSet`]) and compiled once into a
//! [`TagRuleTable`] indexed by object [`Category`] and tag key. Lookups are
//! plain table reads; nothing is resolved by building identifiers from
//! strings at runtime.
//!
//! A classification only says *which* feature an object matches. Whether it
//! contributes is decided per aggregation kind via
//! [`TagRuleTable::feature_applies`], so a way can match `highway=bus_stop`
//! yet add no length.

mod schema;
mod table;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

pub use schema::{FeatureId, FeatureSchema};
pub use table::DEFAULT_RULES;

use crate::Tags;

/// Kind of raw object a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A tagged point.
    Node,
    /// An open way, aggregated by length.
    Way,
    /// A closed way, aggregated by area.
    Area,
}

/// Aggregation applied to a matched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureKind {
    /// Number of matching objects.
    Count,
    /// Summed length in metres.
    Length,
    /// Summed area in square metres.
    Area,
}

impl FeatureKind {
    /// Column suffix used in the output collection.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Length => "length",
            Self::Area => "area",
        }
    }
}

/// Canonical feature and the aggregation kinds it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureDef {
    /// Column stem, e.g. `shop_bakery`.
    pub name: &'static str,
    /// Kinds that produce a column for this feature.
    pub kinds: &'static [FeatureKind],
    /// Closed rings contributing area also bump the `count` column.
    pub counts_areas: bool,
}

/// How a tag value resolves to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMapping {
    /// Any value maps to the feature named after the key itself, except the
    /// listed values.
    Key {
        /// Values treated as absent (`building=no`).
        ignored: &'static [&'static str],
    },
    /// Explicit value to feature-name table; unknown values are skipped.
    Values(&'static [(&'static str, &'static str)]),
}

/// Rule for a single tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    /// Tag key the rule inspects.
    pub key: &'static str,
    /// Object categories the rule is consulted for.
    pub categories: &'static [Category],
    /// Value resolution.
    pub values: ValueMapping,
}

/// A tag key whose classification is dropped when another tag is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutualExclusion {
    /// Key whose classification is suppressed.
    pub key: &'static str,
    /// Key of the tag that wins.
    pub conflicting_key: &'static str,
    /// Value of the winning tag.
    pub conflicting_value: &'static str,
}

/// Static rule declarations compiled by [`TagRuleTable::new`].
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    /// Feature catalogue.
    pub features: &'static [FeatureDef],
    /// Per-key rules, consulted in declaration order.
    pub rules: &'static [TagRule],
    /// Mutual-exclusion pairs.
    pub exclusions: &'static [MutualExclusion],
}

/// Errors raised while compiling a [`RuleSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleTableError {
    /// A rule names a feature missing from the catalogue.
    #[error("rule for key `{key}` references unknown feature `{feature}`")]
    UnknownFeature {
        /// Tag key of the offending rule.
        key: &'static str,
        /// Feature name that is not declared.
        feature: &'static str,
    },
    /// Two catalogue entries share a name.
    #[error("feature `{0}` is declared more than once")]
    DuplicateFeature(&'static str),
}

/// Index of a catalogue feature inside a [`TagRuleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureRef(usize);

/// Result of classifying one tag of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Tag key that produced the match.
    pub key: &'static str,
    /// Matched feature.
    pub feature: FeatureRef,
}

#[derive(Debug, Clone)]
enum KeyRule {
    Key {
        feature: FeatureRef,
        ignored: &'static [&'static str],
    },
    Values(HashMap<&'static str, FeatureRef>),
}

#[derive(Debug, Clone, Default)]
struct CategoryRules {
    rules: Vec<(&'static str, KeyRule)>,
}

/// Compiled tag rules plus the output column schema.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use polyfeat_core::rules::{Category, FeatureKind, TagRuleTable};
///
/// let table = TagRuleTable::default();
/// let tags = HashMap::from([("shop".to_owned(), "bakery".to_owned())]);
/// let columns = table.resolve(Category::Node, &tags, FeatureKind::Count);
/// let names: Vec<_> = columns.iter().map(|id| table.schema().name(*id)).collect();
/// assert_eq!(names, vec![Some("shop_bakery_count")]);
/// ```
#[derive(Debug, Clone)]
pub struct TagRuleTable {
    features: Vec<FeatureDef>,
    node: CategoryRules,
    way: CategoryRules,
    area: CategoryRules,
    relevant_keys: HashSet<&'static str>,
    exclusions: Vec<MutualExclusion>,
    schema: FeatureSchema,
}

impl Default for TagRuleTable {
    fn default() -> Self {
        Self::from_valid(DEFAULT_RULES)
    }
}

impl TagRuleTable {
    /// Compile a rule set, validating that every rule references a declared
    /// feature.
    pub fn new(rule_set: RuleSet) -> Result<Self, RuleTableError> {
        let mut lookup: HashMap<&'static str, FeatureRef> = HashMap::new();
        for (position, def) in rule_set.features.iter().enumerate() {
            if lookup.insert(def.name, FeatureRef(position)).is_some() {
                return Err(RuleTableError::DuplicateFeature(def.name));
            }
        }

        let mut node = CategoryRules::default();
        let mut way = CategoryRules::default();
        let mut area = CategoryRules::default();
        let mut relevant_keys = HashSet::new();

        for rule in rule_set.rules {
            let compiled = compile_rule(rule, &lookup)?;
            relevant_keys.insert(rule.key);
            for category in rule.categories {
                let target = match category {
                    Category::Node => &mut node,
                    Category::Way => &mut way,
                    Category::Area => &mut area,
                };
                target.rules.push((rule.key, compiled.clone()));
            }
        }

        Ok(Self {
            features: rule_set.features.to_vec(),
            node,
            way,
            area,
            relevant_keys,
            exclusions: rule_set.exclusions.to_vec(),
            schema: FeatureSchema::from_features(rule_set.features),
        })
    }

    fn from_valid(rule_set: RuleSet) -> Self {
        match Self::new(rule_set) {
            Ok(table) => table,
            Err(err) => {
                log::error!("invalid bundled rule set: {err}");
                Self::empty()
            }
        }
    }

    fn empty() -> Self {
        Self {
            features: Vec::new(),
            node: CategoryRules::default(),
            way: CategoryRules::default(),
            area: CategoryRules::default(),
            relevant_keys: HashSet::new(),
            exclusions: Vec::new(),
            schema: FeatureSchema::from_features(&[]),
        }
    }

    /// Output column schema derived from the feature catalogue.
    #[must_use]
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Catalogue entry for a matched feature.
    #[must_use]
    pub fn feature(&self, feature: FeatureRef) -> Option<&FeatureDef> {
        self.features.get(feature.0)
    }

    /// Returns true when any tag key is consulted by some rule.
    ///
    /// Cheap pre-filter used by the streaming loop before tags are collected.
    #[must_use]
    pub fn has_relevant_key<'a, T>(&self, keys: T) -> bool
    where
        T: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().any(|key| self.relevant_keys.contains(key))
    }

    /// Resolve every tag of an object to its canonical features.
    ///
    /// Keys without a rule for `category` and values without a mapping are
    /// skipped. Keys suppressed by a [`MutualExclusion`] are dropped. Each
    /// feature appears at most once in the result.
    #[must_use]
    pub fn classify(&self, category: Category, tags: &Tags) -> Vec<Classification> {
        let mut classifications: Vec<Classification> = Vec::new();
        for (key, rule) in &self.rules_for(category).rules {
            let Some(value) = tags.get(*key) else {
                continue;
            };
            let Some(feature) = resolve_value(rule, value) else {
                continue;
            };
            if self.is_mutually_exclusive(key, tags) {
                continue;
            }
            if classifications.iter().any(|c| c.feature == feature) {
                continue;
            }
            classifications.push(Classification { key, feature });
        }
        classifications
    }

    /// Whether `kind` is declared for `feature`.
    #[must_use]
    pub fn feature_applies(&self, feature: FeatureRef, kind: FeatureKind) -> bool {
        self.feature(feature)
            .is_some_and(|def| def.kinds.contains(&kind))
    }

    /// Whether the classification of `key` must be dropped because a
    /// conflicting tag is present.
    #[must_use]
    pub fn is_mutually_exclusive(&self, key: &str, tags: &Tags) -> bool {
        self.exclusions.iter().any(|exclusion| {
            exclusion.key == key
                && tags
                    .get(exclusion.conflicting_key)
                    .is_some_and(|value| value == exclusion.conflicting_value)
        })
    }

    /// Output column for `feature` aggregated as `kind`, if declared.
    #[must_use]
    pub fn column(&self, feature: FeatureRef, kind: FeatureKind) -> Option<FeatureId> {
        if !self.feature_applies(feature, kind) {
            return None;
        }
        self.schema.column(feature.0, kind)
    }

    /// Count column bumped alongside an area contribution, if the feature
    /// counts closed rings.
    #[must_use]
    pub fn companion_count(&self, feature: FeatureRef) -> Option<FeatureId> {
        self.feature(feature)
            .filter(|def| def.counts_areas)
            .and_then(|_| self.column(feature, FeatureKind::Count))
    }

    /// Classify and keep the columns applicable to `kind`.
    #[must_use]
    pub fn resolve(&self, category: Category, tags: &Tags, kind: FeatureKind) -> Vec<FeatureId> {
        self.classify(category, tags)
            .into_iter()
            .filter_map(|classification| self.column(classification.feature, kind))
            .collect()
    }

    const fn rules_for(&self, category: Category) -> &CategoryRules {
        match category {
            Category::Node => &self.node,
            Category::Way => &self.way,
            Category::Area => &self.area,
        }
    }
}

fn compile_rule(
    rule: &TagRule,
    lookup: &HashMap<&'static str, FeatureRef>,
) -> Result<KeyRule, RuleTableError> {
    let find = |feature: &'static str| {
        lookup
            .get(feature)
            .copied()
            .ok_or(RuleTableError::UnknownFeature {
                key: rule.key,
                feature,
            })
    };
    match rule.values {
        ValueMapping::Key { ignored } => Ok(KeyRule::Key {
            feature: find(rule.key)?,
            ignored,
        }),
        ValueMapping::Values(values) => {
            let mut mapped = HashMap::with_capacity(values.len());
            for (value, feature) in values {
                mapped.insert(*value, find(feature)?);
            }
            Ok(KeyRule::Values(mapped))
        }
    }
}

fn resolve_value(rule: &KeyRule, value: &str) -> Option<FeatureRef> {
    match rule {
        KeyRule::Key { feature, ignored } => (!ignored.contains(&value)).then_some(*feature),
        KeyRule::Values(values) => values.get(value).copied(),
    }
}
