use std::collections::BTreeMap;

use tracing::{info, warn};

use super::{tier_matches, CapAssigner, SlotFilter, TIERS};
use crate::error::{ConfigurationError, Result};

/// One labelled vessel position with a finite object quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VesselSlot {
    pub label: String,
    /// `None` is a configuration error; such a slot never receives shapes.
    pub filter: Option<SlotFilter>,
    pub quantity: u32,
}

impl VesselSlot {
    #[must_use]
    pub fn new(label: impl Into<String>, filter: Option<SlotFilter>, quantity: u32) -> Self {
        Self {
            label: label.into(),
            filter,
            quantity,
        }
    }
}

/// Assigns caps of fixed-size collectors (tubes, strips, dishes).
#[derive(Debug, Clone)]
pub struct StandardAssigner {
    slots: Vec<VesselSlot>,
    handed_out: Vec<bool>,
}

impl StandardAssigner {
    /// Creates an assigner over slots in declaration order. Slots without a
    /// filter are reported once here and skipped afterwards.
    #[must_use]
    pub fn new(slots: Vec<VesselSlot>) -> Self {
        for slot in slots.iter().filter(|s| s.filter.is_none()) {
            let err = ConfigurationError::MissingFilter {
                label: slot.label.clone(),
            };
            warn!(label = %slot.label, "{err}; slot treated as exhausted");
        }
        let handed_out = vec![false; slots.len()];
        Self { slots, handed_out }
    }

    #[must_use]
    pub fn slots(&self) -> &[VesselSlot] {
        &self.slots
    }
}

impl CapAssigner for StandardAssigner {
    fn assign(&mut self, class: Option<&str>) -> Result<Option<String>> {
        for tier in TIERS {
            for (index, slot) in self.slots.iter_mut().enumerate() {
                let Some(filter) = &slot.filter else {
                    continue;
                };
                if slot.quantity == 0 || !tier_matches(tier, filter, class) {
                    continue;
                }
                slot.quantity -= 1;
                self.handed_out[index] = true;
                return Ok(Some(slot.label.clone()));
            }
        }
        info!(class = class.unwrap_or("<none>"), "no vessel slot left for shape");
        Ok(None)
    }

    fn labels_by_class(&self) -> BTreeMap<String, Vec<String>> {
        let mut labels: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (slot, used) in self.slots.iter().zip(&self.handed_out) {
            if let (Some(filter), true) = (&slot.filter, *used) {
                labels
                    .entry(filter.to_string())
                    .or_default()
                    .push(slot.label.clone());
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
