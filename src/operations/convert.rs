use crate::error::{Result, UserInputError};
use crate::geometry::{Shape, ShapeKind};
use crate::store::{ShapeHierarchy, ShapeId};

/// Turns the selected area shapes into annotations or detections.
///
/// Region, class, name and plane are kept; display colors are reset.
/// Selected point shapes are left alone.
pub struct ConvertShapes {
    target: ShapeKind,
}

impl ConvertShapes {
    /// Creates a new `ConvertShapes` operation.
    #[must_use]
    pub fn new(target: ShapeKind) -> Self {
        Self { target }
    }

    /// Replaces the selected area shapes and returns the new IDs.
    ///
    /// # Errors
    ///
    /// Returns [`UserInputError::NoSelection`] if nothing is selected.
    pub fn execute<H>(&self, hierarchy: &mut H) -> Result<Vec<ShapeId>>
    where
        H: ShapeHierarchy + ?Sized,
    {
        let selected = hierarchy.selected_shapes();
        if selected.is_empty() {
            return Err(UserInputError::NoSelection.into());
        }

        let areas: Vec<ShapeId> = selected
            .into_iter()
            .filter(|&id| hierarchy.shape(id).is_some_and(Shape::is_area))
            .collect();
        hierarchy.clear_selection();

        let converted = hierarchy
            .remove_shapes(&areas, true)
            .into_iter()
            .take(areas.len())
            .map(|shape| Shape {
                kind: self.target,
                color: None,
                ..shape
            })
            .collect();
        Ok(hierarchy.add_shapes(converted))
    }
}
