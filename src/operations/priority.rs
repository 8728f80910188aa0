use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::Shape;

/// Orders shapes by a user-supplied class ranking.
///
/// Index 0 is the highest priority. Unranked classes and unclassified shapes
/// all share the lowest rank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPriority {
    ranking: Vec<String>,
}

impl ClassPriority {
    #[must_use]
    pub fn new(ranking: Vec<String>) -> Self {
        Self { ranking }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    /// Rank of a class; `usize::MAX` when absent or `None`.
    #[must_use]
    pub fn rank(&self, class: Option<&str>) -> usize {
        class
            .and_then(|c| self.ranking.iter().position(|r| r == c))
            .unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn rank_of(&self, shape: &Shape) -> usize {
        self.rank(shape.class_name())
    }

    /// Compares two shapes; `Less` means `a` has the higher priority.
    #[must_use]
    pub fn compare(&self, a: &Shape, b: &Shape) -> Ordering {
        self.rank_of(a).cmp(&self.rank_of(b))
    }

    /// Stable sort of `shapes` into priority order.
    pub fn sort(&self, shapes: &mut [Shape]) {
        shapes.sort_by_cached_key(|s| self.rank_of(s));
    }
}

/// All class names present, unclassified shapes skipped.
#[must_use]
pub fn all_classes<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> BTreeSet<String> {
    shapes
        .into_iter()
        .filter_map(|s| s.class.clone())
        .collect()
}

/// Returns `true` if every classified shape has the same class.
/// Unclassified shapes are ignored.
#[must_use]
pub fn all_same_class<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> bool {
    let mut common: Option<&str> = None;
    for class in shapes.into_iter().filter_map(Shape::class_name) {
        match common {
            None => common = Some(class),
            Some(c) if c != class => return false,
            Some(_) => {}
        }
    }
    true
}

#[must_use]
pub fn count_by_class<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for class in shapes.into_iter().filter_map(Shape::class_name) {
        *counts.entry(class.to_owned()).or_insert(0) += 1;
    }
    counts
}

#[must_use]
pub fn area_by_class<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> BTreeMap<String, f64> {
    let mut areas = BTreeMap::new();
    for shape in shapes {
        if let Some(class) = shape.class_name() {
            *areas.entry(class.to_owned()).or_insert(0.0) += shape.area();
        }
    }
    areas
}
