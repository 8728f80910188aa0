use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::SameClassPolicy;
use crate::error::Result;
use crate::geometry::Shape;

use super::polygon::{shapes_overlap, Merge};
use super::priority::{all_same_class, ClassPriority};

/// Conflict-free shapes left after resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub shapes: Vec<Shape>,
    /// Number of merge groups collapsed into one shape.
    pub merges: usize,
    /// Number of shapes removed without a replacement.
    pub eliminated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Keep,
    Merge,
    Drop,
}

/// What happens to the pivot at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pivot {
    /// Overlaps nothing that is left: final.
    Emit,
    /// Survived a conflict that cut the scan short: back into the queue.
    Requeue,
    Drop,
}

/// Removes overlaps from a working set by merging or eliminating shapes.
///
/// Each pass takes the first pending shape as pivot and scans the rest:
/// same-class neighbours are merged (or one of the two is discarded at
/// random), different-class neighbours are eliminated together or, with a
/// ranking, the lower-priority one is dropped. A shape dropped in a pass is
/// never looked at again in that pass. Worst case is quadratic per pass.
pub struct ResolveOverlaps<R = StdRng> {
    same_class: SameClassPolicy,
    priority: ClassPriority,
    rng: R,
}

impl ResolveOverlaps<StdRng> {
    /// Creates a new `ResolveOverlaps` operation seeded from the OS.
    #[must_use]
    pub fn new(same_class: SameClassPolicy, priority: ClassPriority) -> Self {
        Self {
            same_class,
            priority,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Makes random tie-breaking reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl<R: Rng> ResolveOverlaps<R> {
    /// Replaces the random source.
    #[must_use]
    pub fn with_rng<S: Rng>(self, rng: S) -> ResolveOverlaps<S> {
        ResolveOverlaps {
            same_class: self.same_class,
            priority: self.priority,
            rng,
        }
    }

    /// Runs resolution to completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GeometryError::PlaneMismatch`] if a merge
    /// group spans image planes. The caller is expected to abort and roll
    /// back.
    pub fn execute(&mut self, shapes: Vec<Shape>) -> Result<Resolution> {
        let mut pending = shapes;
        if !self.priority.is_empty() && !all_same_class(&pending) {
            self.priority.sort(&mut pending);
        }

        let mut resolution = Resolution::default();
        while !pending.is_empty() {
            let pivot = pending.remove(0);
            let (outcome, fates) = self.scan(&pivot, &pending);

            let mut group = vec![];
            let mut kept = Vec::with_capacity(pending.len());
            for (shape, fate) in pending.drain(..).zip(&fates) {
                match fate {
                    Fate::Keep => kept.push(shape),
                    Fate::Merge if outcome != Pivot::Drop => group.push(shape),
                    Fate::Merge => kept.push(shape),
                    Fate::Drop => resolution.eliminated += 1,
                }
            }
            pending = kept;

            if outcome == Pivot::Drop {
                resolution.eliminated += 1;
            } else if !group.is_empty() {
                let class = pivot.class.clone();
                group.insert(0, pivot);
                let merged = Merge::new(&group, class).execute()?;
                resolution.merges += 1;
                self.requeue(&mut pending, merged);
            } else if outcome == Pivot::Requeue {
                self.requeue(&mut pending, pivot);
            } else {
                resolution.shapes.push(pivot);
            }
        }

        debug!(
            output = resolution.shapes.len(),
            merges = resolution.merges,
            eliminated = resolution.eliminated,
            "overlaps resolved"
        );
        Ok(resolution)
    }

    fn scan(&mut self, pivot: &Shape, pending: &[Shape]) -> (Pivot, Vec<Fate>) {
        let mut fates = vec![Fate::Keep; pending.len()];
        for (index, other) in pending.iter().enumerate() {
            if !shapes_overlap(pivot, other) {
                continue;
            }
            if pivot.class == other.class {
                match self.same_class {
                    SameClassPolicy::Merge => fates[index] = Fate::Merge,
                    SameClassPolicy::DiscardOne => {
                        if self.rng.random_bool(0.5) {
                            fates[index] = Fate::Drop;
                            return (Pivot::Requeue, fates);
                        }
                        return (Pivot::Drop, fates);
                    }
                }
                continue;
            }
            if self.priority.is_empty() {
                fates[index] = Fate::Drop;
                return (Pivot::Drop, fates);
            }
            match self.priority.compare(pivot, other) {
                // the pivot wins and may still clash with later shapes
                Ordering::Less => fates[index] = Fate::Drop,
                Ordering::Greater => return (Pivot::Drop, fates),
                Ordering::Equal => {
                    fates[index] = Fate::Drop;
                    return (Pivot::Drop, fates);
                }
            }
        }
        // Only overlaps left are merged or dropped shapes, so the pivot is
        // final unless a merge is pending.
        (Pivot::Emit, fates)
    }

    /// Inserts a replacement after the last shape of equal or better rank.
    fn requeue(&self, pending: &mut Vec<Shape>, shape: Shape) {
        let rank = self.priority.rank_of(&shape);
        let at = pending
            .iter()
            .rposition(|s| self.priority.rank_of(s) <= rank)
            .map_or(0, |i| i + 1);
        pending.insert(at, shape);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{GeometryError, LmdError};
    use crate::geometry::ImagePlane;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64, class: &str) -> Shape {
        Shape::detection(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ])
        .with_class(class)
    }

    fn ranking(classes: &[&str]) -> ClassPriority {
        ClassPriority::new(classes.iter().map(|c| (*c).to_owned()).collect())
    }

    fn assert_conflict_free(shapes: &[Shape]) {
        for (i, a) in shapes.iter().enumerate() {
            for b in &shapes[i + 1..] {
                assert!(!shapes_overlap(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    fn lattice_squares(seed: u64, count: usize) -> Vec<Shape> {
        let mut rng = StdRng::seed_from_u64(seed);
        let classes = ["A", "B", "C"];
        (0..count)
            .map(|_| {
                let x = f64::from(rng.random_range(0..20_u8));
                let y = f64::from(rng.random_range(0..20_u8));
                let size = f64::from(rng.random_range(2..6_u8));
                square(x, y, size, classes[rng.random_range(0..classes.len())])
            })
            .collect()
    }

    #[test]
    fn disjoint_shapes_pass_through() {
        let shapes = vec![square(0.0, 0.0, 2.0, "A"), square(5.0, 0.0, 2.0, "B")];
        let result = ResolveOverlaps::new(SameClassPolicy::Merge, ClassPriority::default())
            .with_seed(1)
            .execute(shapes.clone())
            .unwrap();
        assert_eq!(result.shapes, shapes);
        assert_eq!(result.eliminated, 0);
    }

    #[test]
    fn transitive_chain_merges_into_one() {
        let shapes = vec![
            square(0.0, 0.0, 4.0, "A"),
            square(3.0, 0.0, 4.0, "A"),
            square(6.0, 0.0, 4.0, "A"),
        ];
        let result = ResolveOverlaps::new(SameClassPolicy::Merge, ClassPriority::default())
            .with_seed(1)
            .execute(shapes)
            .unwrap();
        assert_eq!(result.shapes.len(), 1);
        assert_eq!(result.shapes[0].class_name(), Some("A"));
        assert_relative_eq!(result.shapes[0].area(), 40.0, epsilon = 1e-9);
        assert!(result.merges >= 1);
    }

    #[test]
    fn higher_priority_wins_in_either_order() {
        for flip in [false, true] {
            let mut shapes = vec![square(0.0, 0.0, 4.0, "B"), square(2.0, 2.0, 4.0, "A")];
            if flip {
                shapes.reverse();
            }
            let result = ResolveOverlaps::new(SameClassPolicy::Merge, ranking(&["A", "B"]))
                .with_seed(1)
                .execute(shapes)
                .unwrap();
            assert_eq!(result.shapes.len(), 1);
            assert_eq!(result.shapes[0].class_name(), Some("A"));
        }
    }

    #[test]
    fn winning_pivot_keeps_scanning() {
        let shapes = vec![
            square(0.0, 0.0, 10.0, "A"),
            square(-2.0, -2.0, 4.0, "B"),
            square(8.0, 8.0, 4.0, "B"),
            square(20.0, 20.0, 2.0, "B"),
        ];
        let result = ResolveOverlaps::new(SameClassPolicy::Merge, ranking(&["A", "B"]))
            .with_seed(1)
            .execute(shapes)
            .unwrap();
        assert_eq!(result.shapes.len(), 2);
        assert_eq!(result.eliminated, 2);
        assert_eq!(result.shapes[0].class_name(), Some("A"));
    }

    #[test]
    fn no_ranking_excludes_both() {
        let shapes = vec![
            square(0.0, 0.0, 4.0, "A"),
            square(2.0, 2.0, 4.0, "B"),
            square(20.0, 20.0, 4.0, "B"),
        ];
        let result = ResolveOverlaps::new(SameClassPolicy::Merge, ClassPriority::default())
            .with_seed(1)
            .execute(shapes)
            .unwrap();
        assert_eq!(result.shapes.len(), 1);
        assert_eq!(result.eliminated, 2);
    }

    #[test]
    fn equal_rank_excludes_both() {
        let shapes = vec![square(0.0, 0.0, 4.0, "B"), square(2.0, 2.0, 4.0, "C")];
        let result = ResolveOverlaps::new(SameClassPolicy::Merge, ranking(&["A"]))
            .with_seed(1)
            .execute(shapes)
            .unwrap();
        assert!(result.shapes.is_empty());
    }

    #[test]
    fn discard_one_keeps_exactly_one() {
        let shapes = vec![square(0.0, 0.0, 4.0, "A"), square(2.0, 2.0, 4.0, "A")];
        for seed in 0..8 {
            let result = ResolveOverlaps::new(SameClassPolicy::DiscardOne, ClassPriority::default())
                .with_seed(seed)
                .execute(shapes.clone())
                .unwrap();
            assert_eq!(result.shapes.len(), 1);
            assert!(shapes.contains(&result.shapes[0]));
        }
    }

    #[test]
    fn discard_one_is_reproducible() {
        let shapes = lattice_squares(5, 30)
            .into_iter()
            .map(|s| s.with_class("A"))
            .collect::<Vec<_>>();
        let run = |seed| {
            ResolveOverlaps::new(SameClassPolicy::DiscardOne, ClassPriority::default())
                .with_seed(seed)
                .execute(shapes.clone())
                .unwrap()
                .shapes
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn merge_across_planes_fails() {
        let shapes = vec![
            square(0.0, 0.0, 4.0, "A"),
            square(2.0, 2.0, 4.0, "A").with_plane(ImagePlane::new(1, 0)),
        ];
        let err = ResolveOverlaps::new(SameClassPolicy::Merge, ClassPriority::default())
            .with_seed(1)
            .execute(shapes)
            .unwrap_err();
        assert!(matches!(
            err,
            LmdError::Geometry(GeometryError::PlaneMismatch { .. })
        ));
    }

    #[test]
    fn output_never_overlaps() {
        let policies = [
            (SameClassPolicy::Merge, ClassPriority::default()),
            (SameClassPolicy::Merge, ranking(&["C", "A"])),
            (SameClassPolicy::DiscardOne, ClassPriority::default()),
            (SameClassPolicy::DiscardOne, ranking(&["B", "A", "C"])),
        ];
        for seed in 0..4 {
            for (same_class, priority) in &policies {
                let result = ResolveOverlaps::new(*same_class, priority.clone())
                    .with_seed(seed)
                    .execute(lattice_squares(seed, 25))
                    .unwrap();
                assert_conflict_free(&result.shapes);
            }
        }
    }
}
