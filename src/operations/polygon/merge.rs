use crate::error::{GeometryError, Result};
use crate::geometry::{Roi, Shape, ShapeKind};

use super::boolean::union_all;

/// Unions several area shapes into one detection.
///
/// The result takes the given class and the plane of the inputs; names and
/// colors of the inputs are not carried over. Point shapes are ignored.
pub struct Merge<'a> {
    shapes: &'a [Shape],
    class: Option<String>,
}

impl<'a> Merge<'a> {
    /// Creates a new `Merge` operation.
    #[must_use]
    pub fn new(shapes: &'a [Shape], class: Option<String>) -> Self {
        Self { shapes, class }
    }

    /// Executes the merge.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::EmptyMerge`] if no input has an area, and
    /// [`GeometryError::PlaneMismatch`] if the inputs are not all on the
    /// same image plane.
    pub fn execute(&self) -> Result<Shape> {
        let mut areas = self.shapes.iter().filter_map(|s| s.polygons().map(|p| (s, p)));
        let Some((first, first_polygons)) = areas.next() else {
            return Err(GeometryError::EmptyMerge.into());
        };

        let plane = first.plane;
        let mut parts = vec![first_polygons.clone()];
        for (shape, polygons) in areas {
            if shape.plane != plane {
                return Err(GeometryError::PlaneMismatch {
                    expected: plane,
                    found: shape.plane,
                }
                .into());
            }
            parts.push(polygons.clone());
        }

        let mut merged =
            Shape::new(ShapeKind::Detection, Roi::Area(union_all(parts))).with_plane(plane);
        merged.class.clone_from(&self.class);
        Ok(merged)
    }
}
