use geo::{Area, BooleanOps, BoundingRect, Intersects};

use crate::geometry::Shape;
use crate::math::AREA_TOLERANCE;

/// Returns `true` if two area shapes share interior area.
///
/// Shapes that only touch along an edge or at a vertex do not overlap. Point
/// shapes never overlap anything.
#[must_use]
pub fn shapes_overlap(a: &Shape, b: &Shape) -> bool {
    let (Some(pa), Some(pb)) = (a.polygons(), b.polygons()) else {
        return false;
    };
    match (pa.bounding_rect(), pb.bounding_rect()) {
        (Some(ra), Some(rb)) if ra.intersects(&rb) => {}
        _ => return false,
    }
    if !pa.intersects(pb) {
        return false;
    }
    pa.intersection(pb).unsigned_area() > AREA_TOLERANCE
}
