use std::collections::HashMap;

use geo::{Coord, MapCoords};

use crate::geometry::{Roi, Shape};
use crate::math::{Matrix3, Point2, Vector3};
use crate::store::ShapeStore;

/// Flips every shape of an image horizontally and/or vertically.
///
/// Coordinates are scaled by -1 and shifted back into the image, so a
/// horizontal flip maps `x` to `width - x`. Parent links are preserved.
pub struct MirrorShapes {
    matrix: Matrix3,
}

impl MirrorShapes {
    /// Creates a new `MirrorShapes` operation for an image of the given
    /// size in pixels.
    #[must_use]
    pub fn new(horizontal: bool, vertical: bool, width: f64, height: f64) -> Self {
        let (sx, tx) = if horizontal { (-1.0, width) } else { (1.0, 0.0) };
        let (sy, ty) = if vertical { (-1.0, height) } else { (1.0, 0.0) };
        Self {
            matrix: Matrix3::new(sx, 0.0, tx, 0.0, sy, ty, 0.0, 0.0, 1.0),
        }
    }

    /// Returns a new store holding the mirrored shapes. Selection is not
    /// carried over.
    #[must_use]
    pub fn execute(&self, store: &ShapeStore) -> ShapeStore {
        let mut mirrored = ShapeStore::new();
        let mut ids = HashMap::with_capacity(store.len());
        for (id, shape) in store.iter() {
            ids.insert(id, mirrored.insert(self.mirror(shape)));
        }
        for (&old, &new) in &ids {
            if let Some(&parent) = store.parent(old).and_then(|p| ids.get(&p)) {
                mirrored.set_parent(new, Some(parent));
            }
        }
        mirrored
    }

    fn mirror(&self, shape: &Shape) -> Shape {
        let roi = match &shape.roi {
            Roi::Area(polygons) => Roi::Area(polygons.map_coords(|c| {
                let p = transform_point(&self.matrix, &Point2::new(c.x, c.y));
                Coord { x: p.x, y: p.y }
            })),
            Roi::Point(p) => Roi::Point(transform_point(&self.matrix, p)),
        };
        Shape {
            roi,
            color: None,
            ..shape.clone()
        }
    }
}

fn transform_point(matrix: &Matrix3, point: &Point2) -> Point2 {
    let v = matrix * Vector3::new(point.x, point.y, 1.0);
    Point2::new(v.x, v.y)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{ShapeHierarchy, ShapeId};
    use approx::assert_relative_eq;
    use geo::{polygon, BoundingRect};

    fn store_with_square() -> (ShapeStore, ShapeId) {
        let mut store = ShapeStore::new();
        let id = store.insert(
            Shape::detection(polygon![
                (x: 10.0, y: 20.0),
                (x: 30.0, y: 20.0),
                (x: 30.0, y: 25.0),
                (x: 10.0, y: 25.0)
            ])
            .with_class("Tumor"),
        );
        (store, id)
    }

    #[test]
    fn horizontal_flip() {
        let (store, _) = store_with_square();
        let mirrored = MirrorShapes::new(true, false, 100.0, 50.0).execute(&store);
        let (_, shape) = mirrored.iter().next().unwrap();
        let rect = shape.polygons().unwrap().bounding_rect().unwrap();
        assert_relative_eq!(rect.min().x, 70.0);
        assert_relative_eq!(rect.max().x, 90.0);
        assert_relative_eq!(rect.min().y, 20.0);
        assert_eq!(shape.class_name(), Some("Tumor"));
        assert!(shape.is_detection());
    }

    #[test]
    fn vertical_flip_of_point() {
        let mut store = ShapeStore::new();
        store.insert(Shape::point(4.0, 10.0).with_name("calibration1"));
        let mirrored = MirrorShapes::new(false, true, 100.0, 50.0).execute(&store);
        let (_, shape) = mirrored.iter().next().unwrap();
        assert_eq!(shape.roi, Roi::Point(Point2::new(4.0, 40.0)));
        assert_eq!(shape.name.as_deref(), Some("calibration1"));
    }

    #[test]
    fn both_flips_keep_area_and_parents() {
        let (mut store, parent) = store_with_square();
        store.insert_child(parent, Shape::point(12.0, 22.0));
        let mirrored = MirrorShapes::new(true, true, 100.0, 50.0).execute(&store);
        assert_eq!(mirrored.len(), 2);
        let (child_id, child) = mirrored.iter().find(|(_, s)| s.is_point()).unwrap();
        assert_eq!(child.roi, Roi::Point(Point2::new(88.0, 28.0)));
        let parent_id = mirrored.parent(child_id).unwrap();
        assert_relative_eq!(mirrored.shape(parent_id).unwrap().area(), 100.0, epsilon = 1e-9);
    }
}
