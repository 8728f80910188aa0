use geo::Area;

use crate::geometry::{Roi, Shape};
use crate::math::polygon_2d::{close_ring, line_string_points};
use crate::math::Point2;

/// Returns the outline of a shape as a closed ring (first point repeated
/// last).
///
/// Multi-part regions contribute the exterior of their largest part; holes
/// are dropped since a cut follows the outer boundary only. A point shape
/// yields the point itself.
#[must_use]
pub fn to_closed_ring(shape: &Shape) -> Vec<Point2> {
    match &shape.roi {
        Roi::Point(p) => vec![*p],
        Roi::Area(polygons) => polygons
            .iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
            .map(|largest| close_ring(&line_string_points(largest.exterior())))
            .unwrap_or_default(),
    }
}
