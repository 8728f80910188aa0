use std::f64::consts::TAU;

use geo::{Coord, LineString};

use super::{Point2, TOLERANCE};

/// Computes the signed area of a ring (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise. A closing vertex
/// equal to the first one contributes nothing, so open and closed rings give
/// the same result.
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Returns `true` if the first and last points coincide.
#[must_use]
pub fn is_closed(points: &[Point2]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 => {
            (first.x - last.x).abs() < TOLERANCE && (first.y - last.y).abs() < TOLERANCE
        }
        _ => false,
    }
}

/// Returns the ring with its first point repeated at the end, unless it is
/// already closed or empty.
#[must_use]
pub fn close_ring(points: &[Point2]) -> Vec<Point2> {
    let mut ring = points.to_vec();
    if let Some(&first) = points.first() {
        if !is_closed(points) {
            ring.push(first);
        }
    }
    ring
}

/// Converts a `geo` line string into points.
#[must_use]
pub fn line_string_points(line: &LineString<f64>) -> Vec<Point2> {
    line.coords().map(|c| Point2::new(c.x, c.y)).collect()
}

/// Converts points into a `geo` line string.
#[must_use]
pub fn points_line_string(points: &[Point2]) -> LineString<f64> {
    LineString::new(points.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
}

/// Vertices of a regular polygon approximating a circle, counter-clockwise,
/// starting on the positive x axis. The ring is open.
#[must_use]
pub fn circle_points(center: Coord<f64>, radius: f64, segments: usize) -> Vec<Coord<f64>> {
    let segments = segments.max(3);
    #[allow(clippy::cast_precision_loss)]
    let step = TAU / segments as f64;
    (0..segments)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = step * i as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect()
}
