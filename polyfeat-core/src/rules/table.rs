//! Default rule set shipped with the extractor.
//!
//! Feature names are the column stems written to the output collection; the
//! aggregation kind is appended as a suffix (`shop_bakery_count`,
//! `highway_residential_length`, `building_area`).

use super::{Category, FeatureDef, FeatureKind, MutualExclusion, RuleSet, TagRule, ValueMapping};

const COUNT: &[FeatureKind] = &[FeatureKind::Count];
const LENGTH: &[FeatureKind] = &[FeatureKind::Length];
const AREA: &[FeatureKind] = &[FeatureKind::Area];
const COUNT_AND_AREA: &[FeatureKind] = &[FeatureKind::Count, FeatureKind::Area];

const fn feature(name: &'static str, kinds: &'static [FeatureKind]) -> FeatureDef {
    FeatureDef {
        name,
        kinds,
        counts_areas: false,
    }
}

const FEATURES: &[FeatureDef] = &[
    FeatureDef {
        name: "building",
        kinds: COUNT_AND_AREA,
        counts_areas: true,
    },
    feature("highway_motorway", LENGTH),
    feature("highway_trunk", LENGTH),
    feature("highway_primary", LENGTH),
    feature("highway_secondary", LENGTH),
    feature("highway_tertiary", LENGTH),
    feature("highway_residential", LENGTH),
    feature("highway_service", LENGTH),
    feature("highway_footway", LENGTH),
    feature("highway_cycleway", LENGTH),
    feature("highway_bus_stop", COUNT),
    feature("highway_crossing", COUNT),
    feature("highway_traffic_signals", COUNT),
    feature("highway_traffic_calming", COUNT),
    feature("highway_street_lamp", COUNT),
    feature("cycleway_lane", LENGTH),
    feature("cycleway_track", LENGTH),
    feature("cycleway_shared", LENGTH),
    feature("amenity_school", COUNT_AND_AREA),
    feature("amenity_university", COUNT_AND_AREA),
    feature("amenity_hospital", COUNT_AND_AREA),
    feature("amenity_clinic", COUNT_AND_AREA),
    feature("amenity_pharmacy", COUNT_AND_AREA),
    feature("amenity_restaurant", COUNT_AND_AREA),
    feature("amenity_cafe", COUNT_AND_AREA),
    feature("amenity_bar", COUNT_AND_AREA),
    feature("amenity_fast_food", COUNT_AND_AREA),
    feature("amenity_bank", COUNT_AND_AREA),
    feature("amenity_fuel", COUNT_AND_AREA),
    feature("amenity_parking", COUNT_AND_AREA),
    feature("amenity_place_of_worship", COUNT_AND_AREA),
    feature("landuse_residential", AREA),
    feature("landuse_commercial", AREA),
    feature("landuse_industrial", AREA),
    feature("landuse_retail", AREA),
    feature("landuse_farmland", AREA),
    feature("landuse_forest", AREA),
    feature("landuse_grass", AREA),
    feature("landuse_meadow", AREA),
    feature("railway_rail", LENGTH),
    feature("railway_tram", LENGTH),
    feature("railway_subway", LENGTH),
    feature("railway_light_rail", LENGTH),
    feature("railway_station", COUNT),
    feature("railway_halt", COUNT),
    feature("railway_tram_stop", COUNT),
    feature("public_transport_station", COUNT),
    feature("public_transport_stop_position", COUNT),
    feature("public_transport_platform", COUNT),
    feature("shop_bakery", COUNT_AND_AREA),
    feature("shop_supermarket", COUNT_AND_AREA),
    feature("shop_convenience", COUNT_AND_AREA),
    feature("shop_clothes", COUNT_AND_AREA),
    feature("shop_hairdresser", COUNT_AND_AREA),
    feature("shop_butcher", COUNT_AND_AREA),
    feature("shop_mall", COUNT_AND_AREA),
];

const HIGHWAY_VALUES: &[(&str, &str)] = &[
    ("motorway", "highway_motorway"),
    ("motorway_link", "highway_motorway"),
    ("trunk", "highway_trunk"),
    ("trunk_link", "highway_trunk"),
    ("primary", "highway_primary"),
    ("primary_link", "highway_primary"),
    ("secondary", "highway_secondary"),
    ("secondary_link", "highway_secondary"),
    ("tertiary", "highway_tertiary"),
    ("tertiary_link", "highway_tertiary"),
    ("residential", "highway_residential"),
    ("living_street", "highway_residential"),
    ("service", "highway_service"),
    ("footway", "highway_footway"),
    ("pedestrian", "highway_footway"),
    ("steps", "highway_footway"),
    ("bridleway", "highway_footway"),
    ("cycleway", "highway_cycleway"),
    ("bus_stop", "highway_bus_stop"),
    ("crossing", "highway_crossing"),
    ("traffic_signals", "highway_traffic_signals"),
    ("traffic_calming", "highway_traffic_calming"),
    ("street_lamp", "highway_street_lamp"),
];

const CYCLEWAY_VALUES: &[(&str, &str)] = &[
    ("lane", "cycleway_lane"),
    ("opposite_lane", "cycleway_lane"),
    ("track", "cycleway_track"),
    ("opposite_track", "cycleway_track"),
    ("shared_lane", "cycleway_shared"),
    ("share_busway", "cycleway_shared"),
];

const AMENITY_VALUES: &[(&str, &str)] = &[
    ("school", "amenity_school"),
    ("kindergarten", "amenity_school"),
    ("college", "amenity_university"),
    ("university", "amenity_university"),
    ("hospital", "amenity_hospital"),
    ("clinic", "amenity_clinic"),
    ("doctors", "amenity_clinic"),
    ("pharmacy", "amenity_pharmacy"),
    ("restaurant", "amenity_restaurant"),
    ("cafe", "amenity_cafe"),
    ("bar", "amenity_bar"),
    ("pub", "amenity_bar"),
    ("fast_food", "amenity_fast_food"),
    ("bank", "amenity_bank"),
    ("atm", "amenity_bank"),
    ("fuel", "amenity_fuel"),
    ("parking", "amenity_parking"),
    ("place_of_worship", "amenity_place_of_worship"),
];

const LANDUSE_VALUES: &[(&str, &str)] = &[
    ("residential", "landuse_residential"),
    ("commercial", "landuse_commercial"),
    ("industrial", "landuse_industrial"),
    ("retail", "landuse_retail"),
    ("farmland", "landuse_farmland"),
    ("forest", "landuse_forest"),
    ("grass", "landuse_grass"),
    ("meadow", "landuse_meadow"),
];

const RAILWAY_VALUES: &[(&str, &str)] = &[
    ("rail", "railway_rail"),
    ("narrow_gauge", "railway_rail"),
    ("tram", "railway_tram"),
    ("subway", "railway_subway"),
    ("light_rail", "railway_light_rail"),
    ("station", "railway_station"),
    ("halt", "railway_halt"),
    ("tram_stop", "railway_tram_stop"),
];

const PUBLIC_TRANSPORT_VALUES: &[(&str, &str)] = &[
    ("station", "public_transport_station"),
    ("stop_position", "public_transport_stop_position"),
    ("platform", "public_transport_platform"),
];

const SHOP_VALUES: &[(&str, &str)] = &[
    ("bakery", "shop_bakery"),
    ("supermarket", "shop_supermarket"),
    ("convenience", "shop_convenience"),
    ("clothes", "shop_clothes"),
    ("hairdresser", "shop_hairdresser"),
    ("butcher", "shop_butcher"),
    ("mall", "shop_mall"),
];

const RULES: &[TagRule] = &[
    TagRule {
        key: "building",
        categories: &[Category::Node, Category::Area],
        values: ValueMapping::Key { ignored: &["no"] },
    },
    TagRule {
        key: "highway",
        categories: &[Category::Node, Category::Way],
        values: ValueMapping::Values(HIGHWAY_VALUES),
    },
    TagRule {
        key: "cycleway",
        categories: &[Category::Way],
        values: ValueMapping::Values(CYCLEWAY_VALUES),
    },
    TagRule {
        key: "amenity",
        categories: &[Category::Node, Category::Area],
        values: ValueMapping::Values(AMENITY_VALUES),
    },
    TagRule {
        key: "landuse",
        categories: &[Category::Area],
        values: ValueMapping::Values(LANDUSE_VALUES),
    },
    TagRule {
        key: "railway",
        categories: &[Category::Node, Category::Way],
        values: ValueMapping::Values(RAILWAY_VALUES),
    },
    TagRule {
        key: "public_transport",
        categories: &[Category::Node],
        values: ValueMapping::Values(PUBLIC_TRANSPORT_VALUES),
    },
    TagRule {
        key: "shop",
        categories: &[Category::Node, Category::Area],
        values: ValueMapping::Values(SHOP_VALUES),
    },
];

const EXCLUSIONS: &[MutualExclusion] = &[
    MutualExclusion {
        key: "cycleway",
        conflicting_key: "highway",
        conflicting_value: "cycleway",
    },
    MutualExclusion {
        key: "railway",
        conflicting_key: "public_transport",
        conflicting_value: "station",
    },
];

/// Rule set used when no custom rules are supplied.
pub const DEFAULT_RULES: RuleSet = RuleSet {
    features: FEATURES,
    rules: RULES,
    exclusions: EXCLUSIONS,
};
