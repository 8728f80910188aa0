use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::ExpansionOptions;
use crate::error::{Result, UserInputError};
use crate::geometry::Shape;
use crate::store::{ShapeHierarchy, ShapeId};

use super::absorb::AbsorbBackground;
use super::polygon::Expand;
use super::priority::ClassPriority;
use super::resolve::{Resolution, ResolveOverlaps};

/// Outcome of one expansion run.
#[derive(Debug, Clone)]
pub struct ExpansionReport {
    /// Selected shapes that were expanded.
    pub expanded: usize,
    /// Background shapes pulled into resolution.
    pub absorbed: usize,
    pub merges: usize,
    pub eliminated: usize,
    /// IDs of the shapes added back to the hierarchy.
    pub output: Vec<ShapeId>,
    pub elapsed: Duration,
}

/// Expands the selected detections and resolves the overlaps this creates.
///
/// Runs expansion, background absorption and overlap resolution, then
/// commits the result to the hierarchy in one step. If anything fails after
/// the hierarchy was touched, every removed shape is put back.
pub struct ExpandShapes<'a> {
    options: &'a ExpansionOptions,
}

impl<'a> ExpandShapes<'a> {
    /// Creates a new `ExpandShapes` operation.
    #[must_use]
    pub fn new(options: &'a ExpansionOptions) -> Self {
        Self { options }
    }

    /// Executes the pipeline on `hierarchy`.
    ///
    /// # Errors
    ///
    /// Returns a [`UserInputError`] without touching the hierarchy if
    /// nothing eligible is selected or the radius is invalid, and a
    /// geometry error after rolling back if a merge fails.
    pub fn execute<H>(&self, hierarchy: &mut H) -> Result<ExpansionReport>
    where
        H: ShapeHierarchy + ?Sized,
    {
        let start = Instant::now();
        let selected = hierarchy.selected_shapes();
        if selected.is_empty() {
            return Err(UserInputError::NoSelection.into());
        }

        let (ids, sources): (Vec<ShapeId>, Vec<&Shape>) = selected
            .iter()
            .filter_map(|&id| hierarchy.shape(id).map(|s| (id, s)))
            .filter(|(_, s)| s.is_detection() && s.is_area())
            .unzip();
        if ids.is_empty() {
            return Err(UserInputError::NoEligibleShapes.into());
        }

        let radius = self.options.radius_pixels();
        let expanded = sources
            .into_iter()
            .map(|s| Expand::new(s, radius).execute())
            .collect::<Result<Vec<_>>>()?;

        let links = parent_links(hierarchy);
        let originals = hierarchy.remove_shapes(&ids, false);
        hierarchy.clear_selection();

        let mut removed: Vec<(ShapeId, Shape)> = ids.iter().copied().zip(originals).collect();
        let result = self.absorb_and_resolve(hierarchy, expanded, &mut removed);
        let (working_absorbed, resolution) = match result {
            Ok(done) => done,
            Err(err) => {
                error!(restored = removed.len(), "expansion failed, restoring shapes: {err}");
                restore(hierarchy, removed, &links);
                return Err(err);
            }
        };

        let report = ExpansionReport {
            expanded: ids.len(),
            absorbed: working_absorbed,
            merges: resolution.merges,
            eliminated: resolution.eliminated,
            output: hierarchy.add_shapes(resolution.shapes),
            elapsed: start.elapsed(),
        };
        info!(
            expanded = report.expanded,
            absorbed = report.absorbed,
            output = report.output.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "expansion finished"
        );
        Ok(report)
    }

    fn absorb_and_resolve<H>(
        &self,
        hierarchy: &mut H,
        mut working: Vec<Shape>,
        removed: &mut Vec<(ShapeId, Shape)>,
    ) -> Result<(usize, Resolution)>
    where
        H: ShapeHierarchy + ?Sized,
    {
        let absorbed =
            AbsorbBackground::new(self.options.radius_pixels()).execute(hierarchy, &working)?;
        let absorbed_count = absorbed.len();
        working.extend(absorbed.iter().map(|(_, shape)| shape.clone()));
        removed.extend(absorbed);

        let priority = ClassPriority::new(self.options.different_class.ranking().to_vec());
        let mut resolver = ResolveOverlaps::new(self.options.same_class, priority);
        if let Some(seed) = self.options.seed {
            resolver = resolver.with_seed(seed);
        }
        let resolution = resolver.execute(working)?;
        Ok((absorbed_count, resolution))
    }
}

/// Every `(child, parent)` link currently in the hierarchy.
fn parent_links<H>(hierarchy: &H) -> Vec<(ShapeId, ShapeId)>
where
    H: ShapeHierarchy + ?Sized,
{
    hierarchy
        .all_shapes(true)
        .into_iter()
        .filter_map(|id| hierarchy.parent(id).map(|parent| (id, parent)))
        .collect()
}

/// Puts removed shapes back and re-links the tree as recorded in `links`.
/// Restored shapes get new IDs, so links are translated through them.
fn restore<H>(hierarchy: &mut H, removed: Vec<(ShapeId, Shape)>, links: &[(ShapeId, ShapeId)])
where
    H: ShapeHierarchy + ?Sized,
{
    let (old_ids, shapes): (Vec<ShapeId>, Vec<Shape>) = removed.into_iter().unzip();
    let new_ids = hierarchy.add_shapes(shapes);
    let renamed: HashMap<ShapeId, ShapeId> = old_ids.into_iter().zip(new_ids).collect();
    let current = |id: ShapeId| renamed.get(&id).copied().unwrap_or(id);
    for &(child, parent) in links {
        let (child, parent) = (current(child), current(parent));
        if hierarchy.parent(child) != Some(parent) && !hierarchy.set_parent(child, Some(parent)) {
            warn!("could not restore parent link after rollback");
        }
    }
}
