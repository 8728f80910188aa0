use geo::{ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Polygon};

use crate::error::{GeometryError, Result, UserInputError};
use crate::geometry::{Roi, Shape};
use crate::math::polygon_2d::circle_points;
use crate::math::{QUADRANT_SEGMENTS, TOLERANCE};

use super::boolean::union_all;

/// Grows a shape outward by a fixed radius (Minkowski sum with a disc).
///
/// Every boundary segment is swept into a capsule, the convex hull of discs
/// at its two endpoints, and the capsules are unioned with the original
/// region. Convex corners come out rounded and holes narrower than twice the
/// radius close up.
pub struct Expand<'a> {
    shape: &'a Shape,
    radius: f64,
    quadrant_segments: usize,
}

impl<'a> Expand<'a> {
    /// Creates a new `Expand` operation.
    #[must_use]
    pub fn new(shape: &'a Shape, radius: f64) -> Self {
        Self {
            shape,
            radius,
            quadrant_segments: QUADRANT_SEGMENTS,
        }
    }

    /// Sets how many segments approximate a quarter circle.
    #[must_use]
    pub fn with_quadrant_segments(mut self, segments: usize) -> Self {
        self.quadrant_segments = segments.max(1);
        self
    }

    /// Executes the expansion and returns the grown shape.
    ///
    /// Class, name, color, kind and plane are carried over. A radius of zero
    /// returns an unchanged copy.
    ///
    /// # Errors
    ///
    /// Returns [`UserInputError::InvalidRadius`] if the radius is negative or
    /// not finite, and [`GeometryError::Degenerate`] if the grown region is
    /// empty.
    pub fn execute(&self) -> Result<Shape> {
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(UserInputError::InvalidRadius(self.radius).into());
        }
        if self.radius < TOLERANCE {
            return Ok(self.shape.clone());
        }

        let segments = self.quadrant_segments * 4;
        let grown = match &self.shape.roi {
            Roi::Point(p) => {
                let center = Coord { x: p.x, y: p.y };
                MultiPolygon::new(vec![disc(center, self.radius, segments)])
            }
            Roi::Area(polygons) => {
                let mut parts = vec![polygons.clone()];
                for polygon in polygons {
                    for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                        parts.extend(
                            ring.lines()
                                .map(|line| capsule(line.start, line.end, self.radius, segments))
                                .map(|c| MultiPolygon::new(vec![c])),
                        );
                    }
                }
                union_all(parts)
            }
        };

        if grown.0.is_empty() {
            return Err(GeometryError::Degenerate(format!(
                "expansion by {} produced an empty region",
                self.radius
            ))
            .into());
        }
        Ok(self.shape.with_roi(Roi::Area(grown)))
    }
}

fn disc(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let mut ring = circle_points(center, radius, segments);
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    Polygon::new(LineString::new(ring), Vec::new())
}

fn capsule(start: Coord<f64>, end: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let mut points = circle_points(start, radius, segments);
    points.extend(circle_points(end, radius, segments));
    MultiPoint::from(points).convex_hull()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Color, ImagePlane};
    use approx::assert_relative_eq;
    use geo::{polygon, Area, BoundingRect, Contains, Point};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn square() -> Shape {
        Shape::detection(polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0)
        ])
    }

    #[test]
    fn square_grows_by_radius() {
        let grown = Expand::new(&square(), 2.0).execute().unwrap();
        let polygons = grown.polygons().unwrap();
        assert_eq!(polygons.0.len(), 1);

        let rect = polygons.bounding_rect().unwrap();
        assert_relative_eq!(rect.min().x, -2.0, epsilon = 1e-9);
        assert_relative_eq!(rect.max().x, 12.0, epsilon = 1e-9);
        assert_relative_eq!(rect.min().y, -2.0, epsilon = 1e-9);
        assert_relative_eq!(rect.max().y, 12.0, epsilon = 1e-9);

        // 100 + 4 * 10 * 2 + pi * 4, minus the chord loss of a 32-gon
        let exact = 100.0 + 80.0 + PI * 4.0;
        assert!(grown.area() < exact);
        assert!(grown.area() > exact - 0.5, "area={}", grown.area());
        assert!(polygons.contains(&Point::new(-1.5, 5.0)));
    }

    #[test]
    fn metadata_survives() {
        let shape = square()
            .with_class("Tumor")
            .with_name("cell")
            .with_color(Color(1, 2, 3))
            .with_plane(ImagePlane::new(3, 1));
        let grown = Expand::new(&shape, 1.0).execute().unwrap();
        assert_eq!(grown.class_name(), Some("Tumor"));
        assert_eq!(grown.name.as_deref(), Some("cell"));
        assert_eq!(grown.color, Some(Color(1, 2, 3)));
        assert_eq!(grown.plane, ImagePlane::new(3, 1));
        assert!(grown.is_detection());
    }

    #[test]
    fn zero_radius_is_identity() {
        let shape = square();
        let grown = Expand::new(&shape, 0.0).execute().unwrap();
        assert_eq!(grown, shape);
    }

    #[test]
    fn invalid_radius_rejected() {
        for radius in [-1.0, f64::NAN, f64::INFINITY] {
            let err = Expand::new(&square(), radius).execute().unwrap_err();
            assert!(matches!(
                err,
                crate::error::LmdError::UserInput(UserInputError::InvalidRadius(_))
            ));
        }
    }

    #[test]
    fn narrow_hole_closes() {
        let ring = polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 20.0, y: 0.0),
                (x: 20.0, y: 20.0),
                (x: 0.0, y: 20.0)
            ],
            interiors: [
                [
                    (x: 9.0, y: 9.0),
                    (x: 11.0, y: 9.0),
                    (x: 11.0, y: 11.0),
                    (x: 9.0, y: 11.0)
                ],
            ]
        );
        let grown = Expand::new(&Shape::detection(ring), 2.0).execute().unwrap();
        let polygons = grown.polygons().unwrap();
        assert!(polygons.0.iter().all(|p| p.interiors().is_empty()));
        assert!(polygons.contains(&Point::new(10.0, 10.0)));
    }

    /// Concave star around the origin with randomised spike lengths.
    fn star(rng: &mut StdRng, spikes: usize) -> Shape {
        #[allow(clippy::cast_precision_loss)]
        let step = PI / spikes as f64;
        let coords: Vec<Coord<f64>> = (0..spikes * 2)
            .map(|i| {
                let radius = if i % 2 == 0 {
                    rng.random_range(8.0..12.0)
                } else {
                    rng.random_range(2.0..5.0)
                };
                #[allow(clippy::cast_precision_loss)]
                let angle = step * i as f64;
                Coord {
                    x: radius * angle.cos(),
                    y: radius * angle.sin(),
                }
            })
            .collect();
        Shape::detection(Polygon::new(LineString::new(coords), vec![]))
    }

    #[test]
    fn area_never_shrinks_with_radius() {
        let mut rng = StdRng::seed_from_u64(11);
        for spikes in 3..9 {
            let shape = star(&mut rng, spikes);
            let mut previous = shape.area();
            for radius in [0.0, 0.1, 0.5, 1.0, 2.0, 4.0] {
                let area = Expand::new(&shape, radius).execute().unwrap().area();
                assert!(
                    area >= previous - 1e-9,
                    "spikes={spikes} radius={radius}: {area} < {previous}"
                );
                previous = area;
            }
        }
    }

    #[test]
    fn point_becomes_disc() {
        let grown = Expand::new(&Shape::point(5.0, 5.0), 3.0).execute().unwrap();
        assert!(grown.is_area());
        assert_relative_eq!(grown.area(), PI * 9.0, epsilon = 0.5);
    }
}
