use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ConfigurationError, Result};

/// Number of rows on a 96-well plate, labelled `A` to `H`.
pub const WELL_ROWS: u8 = 8;
/// Number of columns on a 96-well plate, numbered from 1.
pub const WELL_COLUMNS: u8 = 12;

/// Draws random, never repeated well labels such as `C7`.
///
/// Uniqueness holds for the lifetime of one generator, which is one export
/// run.
#[derive(Debug)]
pub struct WellLabelGenerator<R = StdRng> {
    rng: R,
    used: HashSet<String>,
}

impl WellLabelGenerator<StdRng> {
    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Creates a reproducible generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> WellLabelGenerator<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            used: HashSet::new(),
        }
    }

    /// Draws a label not handed out before.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::WellLabelsExhausted`] once every well
    /// of the plate has been used.
    pub fn next_label(&mut self) -> Result<String> {
        if self.used.len() >= usize::from(WELL_ROWS) * usize::from(WELL_COLUMNS) {
            return Err(ConfigurationError::WellLabelsExhausted.into());
        }
        loop {
            let row = self.rng.random_range(0..WELL_ROWS);
            let column = self.rng.random_range(1..=WELL_COLUMNS);
            let label = format!("{}{column}", char::from(b'A' + row));
            if self.used.insert(label.clone()) {
                return Ok(label);
            }
        }
    }

    /// Marks a label as taken without drawing it. Returns `false` if it was
    /// already in use.
    pub fn reserve(&mut self, label: impl Into<String>) -> bool {
        self.used.insert(label.into())
    }

    /// Number of labels handed out or reserved.
    #[must_use]
    pub fn used_count(&self) -> usize {
        self.used.len()
    }
}
