//! Shared helpers for polyfeat-data behaviour tests.

use geo::MultiPolygon;
use polyfeat_core::test_support::rectangle;

/// Relative tolerance for measured lengths and areas.
const RELATIVE_TOLERANCE: f64 = 1.0e-9;

/// West half of a 0.02 x 0.01 degree strip.
pub fn west() -> MultiPolygon<f64> {
    rectangle(0.0, 0.0, 0.01, 0.01)
}

/// East half of a 0.02 x 0.01 degree strip.
pub fn east() -> MultiPolygon<f64> {
    rectangle(0.01, 0.0, 0.02, 0.01)
}

/// Assert that `actual` equals `expected` up to a relative tolerance.
#[expect(
    clippy::float_arithmetic,
    reason = "tolerance scales with the expected value"
)]
pub fn assert_close(actual: f64, expected: f64) {
    let tolerance = RELATIVE_TOLERANCE * expected.abs().max(1.0);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}
