use crate::geometry::Shape;

/// Reorders shapes along a greedy nearest-neighbour walk over their
/// centroids, starting at the first shape, to shorten laser travel between
/// cuts. Shapes without a centroid keep their relative order at the end.
#[must_use]
pub fn nearest_neighbour_order(shapes: Vec<Shape>) -> Vec<Shape> {
    let (mut pending, unplaced): (Vec<_>, Vec<_>) = shapes
        .into_iter()
        .map(|s| (s.centroid(), s))
        .partition(|(c, _)| c.is_some());

    let mut ordered = Vec::with_capacity(pending.len() + unplaced.len());
    let mut current = if pending.is_empty() {
        None
    } else {
        Some(pending.remove(0))
    };
    while let Some((Some(at), shape)) = current {
        ordered.push(shape);
        let next = pending
            .iter()
            .enumerate()
            .filter_map(|(i, (c, _))| c.map(|c| (i, (c - at).norm_squared())))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i);
        current = next.map(|i| pending.remove(i));
    }
    ordered.extend(unplaced.into_iter().map(|(_, s)| s));
    ordered
}
