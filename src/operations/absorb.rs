use tracing::debug;

use crate::error::Result;
use crate::geometry::Shape;
use crate::store::{ShapeHierarchy, ShapeId};

use super::polygon::Expand;

/// Multiple of the expansion radius searched for background shapes.
pub const ENVELOPE_FACTOR: f64 = 10.0;

/// Pulls pre-existing shapes near the expanded ones out of the hierarchy so
/// they take part in overlap resolution.
///
/// The search envelope is each working shape buffered by ten times the
/// expansion radius, on the working shape's own image plane. Annotations are
/// never absorbed. A shape is absorbed at most once since it leaves the
/// hierarchy the moment it is taken; its children stay behind, re-parented.
pub struct AbsorbBackground {
    radius: f64,
    envelope_factor: f64,
}

impl AbsorbBackground {
    /// Creates a new `AbsorbBackground` operation for the given expansion
    /// radius in pixels.
    #[must_use]
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            envelope_factor: ENVELOPE_FACTOR,
        }
    }

    /// Overrides the envelope multiple.
    #[must_use]
    pub fn with_envelope_factor(mut self, factor: f64) -> Self {
        self.envelope_factor = factor;
        self
    }

    /// Removes background shapes near `working` from `hierarchy` and
    /// returns them with their former IDs, in discovery order.
    ///
    /// # Errors
    ///
    /// Returns an error if a search envelope cannot be built. Shapes taken
    /// before the failure are lost from the hierarchy; callers roll back.
    pub fn execute<H>(
        &self,
        hierarchy: &mut H,
        working: &[Shape],
    ) -> Result<Vec<(ShapeId, Shape)>>
    where
        H: ShapeHierarchy + ?Sized,
    {
        let distance = self.radius * self.envelope_factor;
        let mut absorbed = Vec::new();
        for shape in working {
            let envelope = Expand::new(shape, distance).execute()?;
            let Some(region) = envelope.polygons() else {
                continue;
            };
            let ids: Vec<ShapeId> = hierarchy
                .shapes_overlapping(region)
                .into_iter()
                .filter(|&id| {
                    hierarchy
                        .shape(id)
                        .is_some_and(|s| !s.is_annotation() && s.plane == shape.plane)
                })
                .collect();
            if ids.is_empty() {
                continue;
            }
            let taken = hierarchy.remove_shapes(&ids, false);
            debug!(count = taken.len(), "absorbed background shapes");
            absorbed.extend(ids.into_iter().zip(taken));
        }
        Ok(absorbed)
    }
}
