use std::collections::HashSet;

use geo::{BoundingRect, Intersects, MultiPolygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use slotmap::SlotMap;

use crate::geometry::{Roi, Shape};

slotmap::new_key_type! {
    /// Unique identifier for a shape in a shape hierarchy.
    pub struct ShapeId;
}

/// The host-side object hierarchy the pipeline reads from and writes to.
///
/// The pipeline never owns the hierarchy. It only queries it, removes shapes
/// it is about to replace and adds the final shapes back.
pub trait ShapeHierarchy {
    /// Shapes currently selected by the user, in selection order.
    fn selected_shapes(&self) -> Vec<ShapeId>;

    /// Every shape, optionally skipping annotations.
    fn all_shapes(&self, include_annotations: bool) -> Vec<ShapeId>;

    /// Shapes whose region intersects `region`, touching included.
    fn shapes_overlapping(&self, region: &MultiPolygon<f64>) -> Vec<ShapeId>;

    /// Looks up a shape by ID.
    fn shape(&self, id: ShapeId) -> Option<&Shape>;

    /// Parent of a shape; `None` for top-level or unknown shapes.
    fn parent(&self, id: ShapeId) -> Option<ShapeId>;

    /// Moves a shape under `parent`, or to the top level with `None`.
    /// Returns `false` if the move is not possible.
    fn set_parent(&mut self, id: ShapeId, parent: Option<ShapeId>) -> bool;

    /// Inserts shapes at the top level and returns their new IDs.
    fn add_shapes(&mut self, shapes: Vec<Shape>) -> Vec<ShapeId>;

    /// Removes shapes and returns them. Unknown IDs are ignored. Children of
    /// removed shapes are removed too when `also_remove_children` is set,
    /// otherwise they are re-parented to the removed shape's parent.
    fn remove_shapes(&mut self, ids: &[ShapeId], also_remove_children: bool) -> Vec<Shape>;

    /// Deselects everything.
    fn clear_selection(&mut self);
}

#[derive(Debug, Clone)]
struct Entry {
    shape: Shape,
    parent: Option<ShapeId>,
}

/// Bounding box of a stored shape, as kept in the R-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedShape {
    envelope: AABB<[f64; 2]>,
    id: ShapeId,
}

impl RTreeObject for IndexedShape {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// In-memory shape hierarchy with a spatial index.
///
/// Shapes live in a slot map keyed by [`ShapeId`]; their bounding boxes are
/// mirrored in an R-tree so overlap queries only test nearby candidates.
#[derive(Debug, Default)]
pub struct ShapeStore {
    shapes: SlotMap<ShapeId, Entry>,
    index: RTree<IndexedShape>,
    selection: Vec<ShapeId>,
}

impl ShapeStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a top-level shape and returns its ID.
    pub fn insert(&mut self, shape: Shape) -> ShapeId {
        self.insert_entry(shape, None)
    }

    /// Inserts a shape as a child of `parent`.
    pub fn insert_child(&mut self, parent: ShapeId, shape: Shape) -> ShapeId {
        let parent = self.shapes.contains_key(parent).then_some(parent);
        self.insert_entry(shape, parent)
    }

    fn insert_entry(&mut self, shape: Shape, parent: Option<ShapeId>) -> ShapeId {
        let envelope = shape_envelope(&shape);
        let id = self.shapes.insert(Entry { shape, parent });
        if let Some(envelope) = envelope {
            self.index.insert(IndexedShape { envelope, id });
        }
        id
    }

    /// Returns the parent of a shape, if it has one.
    #[must_use]
    pub fn parent(&self, id: ShapeId) -> Option<ShapeId> {
        self.shapes.get(id).and_then(|entry| entry.parent)
    }

    /// Moves a shape under another parent, or to the top level with `None`.
    /// Returns `false` if either shape is unknown or the move would create
    /// a cycle.
    pub fn set_parent(&mut self, id: ShapeId, parent: Option<ShapeId>) -> bool {
        if let Some(p) = parent {
            let mut ancestor = Some(p);
            while let Some(a) = ancestor {
                if a == id || !self.shapes.contains_key(a) {
                    return false;
                }
                ancestor = self.parent(a);
            }
        }
        match self.shapes.get_mut(id) {
            Some(entry) => {
                entry.parent = parent;
                true
            }
            None => false,
        }
    }

    /// Adds a shape to the selection.
    pub fn select(&mut self, id: ShapeId) {
        if self.shapes.contains_key(id) && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    /// Selects every shape, annotations included.
    pub fn select_all(&mut self) {
        self.selection = self.shapes.keys().collect();
    }

    /// Number of shapes in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Returns `true` if the store holds no shapes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Iterates over all shapes with their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().map(|(id, entry)| (id, &entry.shape))
    }

    fn collect_descendants(&self, roots: &HashSet<ShapeId>) -> HashSet<ShapeId> {
        let mut all = roots.clone();
        loop {
            let before = all.len();
            for (id, entry) in &self.shapes {
                if entry.parent.is_some_and(|p| all.contains(&p)) {
                    all.insert(id);
                }
            }
            if all.len() == before {
                return all;
            }
        }
    }
}

impl ShapeHierarchy for ShapeStore {
    fn selected_shapes(&self) -> Vec<ShapeId> {
        self.selection.clone()
    }

    fn all_shapes(&self, include_annotations: bool) -> Vec<ShapeId> {
        self.shapes
            .iter()
            .filter(|(_, entry)| include_annotations || !entry.shape.is_annotation())
            .map(|(id, _)| id)
            .collect()
    }

    fn shapes_overlapping(&self, region: &MultiPolygon<f64>) -> Vec<ShapeId> {
        let Some(bounds) = region.bounding_rect() else {
            return Vec::new();
        };
        let query = rect_envelope(&bounds);
        let mut hits: Vec<ShapeId> = self
            .index
            .locate_in_envelope_intersecting(&query)
            .map(|indexed| indexed.id)
            .filter(|&id| {
                self.shapes.get(id).is_some_and(|entry| match &entry.shape.roi {
                    Roi::Area(polygons) => region.intersects(polygons),
                    Roi::Point(p) => region.intersects(&geo::Point::new(p.x, p.y)),
                })
            })
            .collect();
        // R-tree order depends on insertion history; keep results stable.
        hits.sort();
        hits
    }

    fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id).map(|entry| &entry.shape)
    }

    fn parent(&self, id: ShapeId) -> Option<ShapeId> {
        ShapeStore::parent(self, id)
    }

    fn set_parent(&mut self, id: ShapeId, parent: Option<ShapeId>) -> bool {
        ShapeStore::set_parent(self, id, parent)
    }

    fn add_shapes(&mut self, shapes: Vec<Shape>) -> Vec<ShapeId> {
        shapes.into_iter().map(|shape| self.insert(shape)).collect()
    }

    fn remove_shapes(&mut self, ids: &[ShapeId], also_remove_children: bool) -> Vec<Shape> {
        let roots: HashSet<ShapeId> = ids
            .iter()
            .copied()
            .filter(|&id| self.shapes.contains_key(id))
            .collect();
        let doomed = if also_remove_children {
            self.collect_descendants(&roots)
        } else {
            roots
        };

        if !also_remove_children {
            let orphans: Vec<(ShapeId, Option<ShapeId>)> = self
                .shapes
                .iter()
                .filter(|(id, _)| !doomed.contains(id))
                .filter_map(|(id, entry)| {
                    let parent = entry.parent.filter(|p| doomed.contains(p))?;
                    Some((id, self.nearest_surviving_ancestor(parent, &doomed)))
                })
                .collect();
            for (id, new_parent) in orphans {
                if let Some(entry) = self.shapes.get_mut(id) {
                    entry.parent = new_parent;
                }
            }
        }

        let mut removed = Vec::with_capacity(doomed.len());
        // Preserve the caller's order first, then any descendants.
        let ordered = ids
            .iter()
            .copied()
            .chain(self.shapes.keys().filter(|id| !ids.contains(id)))
            .filter(|id| doomed.contains(id))
            .collect::<Vec<_>>();
        for id in ordered {
            if let Some(entry) = self.shapes.remove(id) {
                if let Some(envelope) = shape_envelope(&entry.shape) {
                    self.index.remove(&IndexedShape { envelope, id });
                }
                removed.push(entry.shape);
            }
        }
        self.selection.retain(|id| !doomed.contains(id));
        removed
    }

    fn clear_selection(&mut self) {
        self.selection.clear();
    }
}

impl ShapeStore {
    fn nearest_surviving_ancestor(
        &self,
        mut current: ShapeId,
        doomed: &HashSet<ShapeId>,
    ) -> Option<ShapeId> {
        while doomed.contains(&current) {
            current = self.shapes.get(current)?.parent?;
        }
        Some(current)
    }
}

fn rect_envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

fn shape_envelope(shape: &Shape) -> Option<AABB<[f64; 2]>> {
    match &shape.roi {
        Roi::Area(polygons) => polygons.bounding_rect().map(|r| rect_envelope(&r)),
        Roi::Point(p) => Some(AABB::from_point([p.x, p.y])),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square_at(x: f64, y: f64, size: f64) -> Shape {
        Shape::detection(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ])
    }

    fn region(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        square_at(x, y, size).polygons().unwrap().clone()
    }

    #[test]
    fn overlap_query_uses_exact_geometry() {
        let mut store = ShapeStore::new();
        let near = store.insert(square_at(0.0, 0.0, 2.0));
        let far = store.insert(square_at(10.0, 10.0, 2.0));
        let point = store.insert(Shape::point(1.0, 1.0));

        let hits = store.shapes_overlapping(&region(1.0, 1.0, 2.0));
        assert!(hits.contains(&near));
        assert!(hits.contains(&point));
        assert!(!hits.contains(&far));
    }

    #[test]
    fn removed_shapes_leave_the_index() {
        let mut store = ShapeStore::new();
        let id = store.insert(square_at(0.0, 0.0, 2.0));
        store.select(id);

        let removed = store.remove_shapes(&[id], false);
        assert_eq!(removed.len(), 1);
        assert!(store.is_empty());
        assert!(store.selected_shapes().is_empty());
        assert!(store.shapes_overlapping(&region(0.0, 0.0, 5.0)).is_empty());
    }

    #[test]
    fn remove_with_children_is_recursive() {
        let mut store = ShapeStore::new();
        let root = store.insert(Shape::annotation(region(0.0, 0.0, 10.0).0[0].clone()));
        let child = store.insert_child(root, square_at(1.0, 1.0, 2.0));
        let grandchild = store.insert_child(child, square_at(1.5, 1.5, 0.5));
        let unrelated = store.insert(square_at(20.0, 20.0, 1.0));

        let removed = store.remove_shapes(&[root], true);
        assert_eq!(removed.len(), 3);
        assert!(store.shape(child).is_none());
        assert!(store.shape(grandchild).is_none());
        assert!(store.shape(unrelated).is_some());
    }

    #[test]
    fn remove_without_children_reparents() {
        let mut store = ShapeStore::new();
        let root = store.insert(square_at(0.0, 0.0, 10.0));
        let middle = store.insert_child(root, square_at(1.0, 1.0, 5.0));
        let leaf = store.insert_child(middle, square_at(2.0, 2.0, 1.0));

        store.remove_shapes(&[middle], false);
        assert_eq!(store.parent(leaf), Some(root));
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let mut store = ShapeStore::new();
        let a = store.insert(square_at(0.0, 0.0, 10.0));
        let b = store.insert_child(a, square_at(1.0, 1.0, 2.0));
        assert!(!store.set_parent(a, Some(b)));
        assert!(!store.set_parent(a, Some(a)));
        assert!(store.set_parent(b, None));
        assert_eq!(store.parent(b), None);
        assert!(store.set_parent(a, Some(b)));
        assert_eq!(store.parent(a), Some(b));
    }

    #[test]
    fn all_shapes_can_skip_annotations() {
        let mut store = ShapeStore::new();
        let detection = store.insert(square_at(0.0, 0.0, 1.0));
        let annotation = store.insert(Shape::point(5.0, 5.0));

        assert_eq!(store.all_shapes(false), vec![detection]);
        let all = store.all_shapes(true);
        assert!(all.contains(&detection) && all.contains(&annotation));
    }

    #[test]
    fn selection_tracks_order() {
        let mut store = ShapeStore::new();
        let a = store.insert(square_at(0.0, 0.0, 1.0));
        let b = store.insert(square_at(3.0, 0.0, 1.0));
        store.select(b);
        store.select(a);
        store.select(b);
        assert_eq!(store.selected_shapes(), vec![b, a]);
        store.clear_selection();
        assert!(store.selected_shapes().is_empty());
    }
}
