//! Vessel label assignment.
//!
//! A [`CapAssigner`] hands out one collector label per exported shape while
//! consuming the capacity of the configured vessel slots. Assigners are built
//! fresh for each export run and dropped afterwards.

mod filter;
mod labels;
mod standard;
mod well_plate;

use std::collections::BTreeMap;

pub use filter::SlotFilter;
pub use labels::{WellLabelGenerator, WELL_COLUMNS, WELL_ROWS};
pub use standard::{StandardAssigner, VesselSlot};
pub use well_plate::{GridSlot, WellPlateAssigner};

use crate::error::Result;

/// Assigns collector labels to a stream of shapes.
pub trait CapAssigner {
    /// Returns the label for the next shape of the given class, or `None`
    /// when no slot accepts it.
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh label is needed but cannot be generated.
    fn assign(&mut self, class: Option<&str>) -> Result<Option<String>>;

    /// Labels handed out so far, keyed by the filter of the slot that
    /// produced them.
    fn labels_by_class(&self) -> BTreeMap<String, Vec<String>>;

    /// Returns `true` if any slot is restricted to a specific class.
    fn is_classified(&self) -> bool;
}

/// Which filter tier is being scanned. Slots are matched against every
/// all-objects filter first, then exact class names, then catch-alls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    All,
    Class,
    Remaining,
}

const TIERS: [Tier; 3] = [Tier::All, Tier::Class, Tier::Remaining];

fn tier_matches(tier: Tier, filter: &SlotFilter, class: Option<&str>) -> bool {
    match (tier, filter) {
        (Tier::All, SlotFilter::AllObjects) | (Tier::Remaining, SlotFilter::RemainingObjects) => true,
        (Tier::Class, SlotFilter::Class(name)) => Some(name.as_str()) == class,
        _ => false,
    }
}
