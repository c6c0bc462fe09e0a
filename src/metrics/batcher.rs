//! Batching
//!
//! A single publish request accepts at most [`MAX_METRIC_DATA`] points.

use super::MetricPoint;

/// Maximum number of points per publish request
pub const MAX_METRIC_DATA: usize = 1000;

/// Split `points` into order-preserving batches of at most
/// [`MAX_METRIC_DATA`] points. No points, no batches.
pub fn batches(points: &[MetricPoint]) -> std::slice::Chunks<'_, MetricPoint> {
    batches_of(points, MAX_METRIC_DATA)
}

/// Same as [`batches`] with an explicit limit.
///
/// # Panics
///
/// Panics if `limit` is zero.
pub fn batches_of(points: &[MetricPoint], limit: usize) -> std::slice::Chunks<'_, MetricPoint> {
    assert!(limit > 0, "batch limit must be positive");
    points.chunks(limit)
}
