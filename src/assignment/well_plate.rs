use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::{tier_matches, CapAssigner, SlotFilter, WellLabelGenerator, TIERS};
use crate::error::{ConfigurationError, Result};

/// A class entry of a well plate: `quantity` objects spread over `wells`
/// wells holding `objects_per_well` each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSlot {
    pub filter: Option<SlotFilter>,
    pub quantity: u32,
    pub wells: u32,
    pub objects_per_well: u32,
    active_label: Option<String>,
    active_remaining: u32,
    labels: Vec<String>,
}

impl GridSlot {
    #[must_use]
    pub fn new(filter: Option<SlotFilter>, quantity: u32, wells: u32, objects_per_well: u32) -> Self {
        Self {
            filter,
            quantity,
            wells,
            objects_per_well,
            active_label: None,
            active_remaining: 0,
            labels: Vec::new(),
        }
    }

    /// Splits `quantity` objects evenly across `wells` wells.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::TooManyWells`] if there are more wells
    /// than objects, and [`ConfigurationError::UnevenWellSplit`] if the
    /// objects do not divide evenly.
    pub fn evenly_split(filter: Option<SlotFilter>, quantity: u32, wells: u32) -> Result<Self> {
        if wells > quantity {
            return Err(ConfigurationError::TooManyWells { quantity, wells }.into());
        }
        if wells == 0 || quantity % wells != 0 {
            return Err(ConfigurationError::UnevenWellSplit { quantity, wells }.into());
        }
        Ok(Self::new(filter, quantity, wells, quantity / wells))
    }

    /// Well labels opened for this entry so far, in order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn needs_new_well(&self) -> bool {
        self.active_label.is_none() || self.active_remaining == 0
    }

    fn can_take(&self) -> bool {
        self.quantity > 0 && (!self.needs_new_well() || (self.wells > 0 && self.objects_per_well > 0))
    }
}

/// Assigns wells of a 96-well plate, opening a fresh random well whenever
/// the active one of an entry is full.
#[derive(Debug)]
pub struct WellPlateAssigner<R = StdRng> {
    slots: Vec<GridSlot>,
    generator: WellLabelGenerator<R>,
}

impl<R: Rng> WellPlateAssigner<R> {
    #[must_use]
    pub fn new(slots: Vec<GridSlot>, generator: WellLabelGenerator<R>) -> Self {
        for (index, slot) in slots.iter().enumerate() {
            if slot.filter.is_none() {
                let err = ConfigurationError::MissingFilter {
                    label: format!("#{}", index + 1),
                };
                warn!(entry = index + 1, "{err}; entry treated as exhausted");
            }
        }
        Self { slots, generator }
    }

    #[must_use]
    pub fn slots(&self) -> &[GridSlot] {
        &self.slots
    }

    fn find_slot(&self, class: Option<&str>) -> Option<usize> {
        TIERS.into_iter().find_map(|tier| {
            self.slots.iter().position(|slot| {
                slot.filter
                    .as_ref()
                    .is_some_and(|f| tier_matches(tier, f, class))
                    && slot.can_take()
            })
        })
    }
}

impl<R: Rng> CapAssigner for WellPlateAssigner<R> {
    fn assign(&mut self, class: Option<&str>) -> Result<Option<String>> {
        let Some(index) = self.find_slot(class) else {
            info!(class = class.unwrap_or("<none>"), "no well left for shape");
            return Ok(None);
        };

        let slot = &mut self.slots[index];
        let active = if slot.needs_new_well() {
            None
        } else {
            slot.active_label.clone()
        };
        let label = match active {
            Some(label) => label,
            None => {
                let label = self.generator.next_label()?;
                debug!(well = %label, entry = index + 1, "opening well");
                slot.wells -= 1;
                slot.active_remaining = slot.objects_per_well;
                slot.active_label = Some(label.clone());
                slot.labels.push(label.clone());
                label
            }
        };
        slot.quantity -= 1;
        slot.active_remaining -= 1;
        Ok(Some(label))
    }

    fn labels_by_class(&self) -> BTreeMap<String, Vec<String>> {
        let mut labels: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for slot in &self.slots {
            if let Some(filter) = &slot.filter {
                if !slot.labels.is_empty() {
                    labels
                        .entry(filter.to_string())
                        .or_default()
                        .extend(slot.labels.iter().cloned());
                }
            }
        }
        labels
    }

    fn is_classified(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s.filter, Some(SlotFilter::Class(_))))
    }
}
