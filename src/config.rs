//! User-facing options, deserialised from JSON.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::assignment::{
    CapAssigner, GridSlot, SlotFilter, StandardAssigner, VesselSlot, WellLabelGenerator,
    WellPlateAssigner,
};
use crate::error::{ConfigurationError, IoError, LmdError, Result};

/// What to do when two shapes of the same class overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameClassPolicy {
    #[default]
    Merge,
    /// Keep one of the two at random.
    DiscardOne,
}

/// What to do when two shapes of different classes overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferentClassPolicy {
    #[default]
    ExcludeBoth,
    /// Keep the shape whose class comes first; index 0 is the highest
    /// priority.
    Priority(Vec<String>),
}

impl DifferentClassPolicy {
    /// The class ranking, empty for [`DifferentClassPolicy::ExcludeBoth`].
    #[must_use]
    pub fn ranking(&self) -> &[String] {
        match self {
            Self::ExcludeBoth => &[],
            Self::Priority(ranking) => ranking,
        }
    }
}

/// Parameters of one expansion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionOptions {
    pub radius_microns: f64,
    /// Averaged pixel size of the image; without it the radius is taken
    /// to be in pixels already.
    pub pixel_size_microns: Option<f64>,
    pub same_class: SameClassPolicy,
    pub different_class: DifferentClassPolicy,
    /// Seed for random tie-breaking. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            radius_microns: 3.0,
            pixel_size_microns: None,
            same_class: SameClassPolicy::default(),
            different_class: DifferentClassPolicy::default(),
            seed: None,
        }
    }
}

impl ExpansionOptions {
    /// Expansion radius converted to pixels.
    #[must_use]
    pub fn radius_pixels(&self) -> f64 {
        match self.pixel_size_microns {
            Some(size) if size > 0.0 => self.radius_microns / size,
            _ => self.radius_microns,
        }
    }

    /// Loads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

/// The physical collector mounted under the microscope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectorType {
    #[default]
    None,
    #[serde(rename = "PCR Tubes")]
    PcrTubes,
    #[serde(rename = "8-Fold Strip")]
    EightFoldStrip,
    #[serde(rename = "12-Fold Strip")]
    TwelveFoldStrip,
    #[serde(rename = "96-Well Plate")]
    WellPlate96,
    #[serde(rename = "Petri Dishes")]
    PetriDishes,
}

impl CollectorType {
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::PcrTubes,
        Self::EightFoldStrip,
        Self::TwelveFoldStrip,
        Self::WellPlate96,
        Self::PetriDishes,
    ];

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::PcrTubes => "PCR Tubes",
            Self::EightFoldStrip => "8-Fold Strip",
            Self::TwelveFoldStrip => "12-Fold Strip",
            Self::WellPlate96 => "96-Well Plate",
            Self::PetriDishes => "Petri Dishes",
        }
    }

    /// Number of fixed cap positions, `None` for collectors without fixed
    /// caps.
    #[must_use]
    pub fn cap_count(self) -> Option<usize> {
        match self {
            Self::PcrTubes => Some(5),
            Self::EightFoldStrip => Some(8),
            Self::TwelveFoldStrip => Some(12),
            Self::PetriDishes => Some(2),
            Self::None | Self::WellPlate96 => None,
        }
    }

    /// Default cap labels `A`, `B`, `C`, ... for fixed-size collectors.
    #[must_use]
    pub fn default_labels(self) -> Vec<String> {
        let count = self.cap_count().unwrap_or(0);
        (b'A'..=b'Z')
            .take(count)
            .map(|c| char::from(c).to_string())
            .collect()
    }

    /// Suffix of the summary file written next to the XML.
    #[must_use]
    pub fn summary_file_suffix(self) -> &'static str {
        match self {
            Self::None => "well_data.json",
            Self::PcrTubes => "well_data_pcr_tubes.json",
            Self::EightFoldStrip => "well_data_8_fold_strip.json",
            Self::TwelveFoldStrip => "well_data_12_fold_strip.json",
            Self::WellPlate96 => "well_data_96_well_plate.json",
            Self::PetriDishes => "well_data_petri_dishes.json",
        }
    }
}

impl fmt::Display for CollectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CollectorType {
    type Err = LmdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.display_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigurationError::UnknownCollector(s.to_owned()).into())
    }
}

/// One row of the collector table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Cap label; falls back to the collector's default label at the same
    /// position. Ignored for well plates.
    #[serde(default)]
    pub label: Option<String>,
    pub filter: Option<SlotFilter>,
    pub quantity: u32,
    /// Number of wells for a well-plate entry.
    #[serde(default)]
    pub wells: Option<u32>,
}

/// The collector and its class-to-vessel table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub collector: CollectorType,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

impl CollectorConfig {
    /// Loads a collector table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Builds a fresh assigner for one export run, or `None` when no
    /// collector is used.
    ///
    /// # Errors
    ///
    /// Returns an error if a well-plate entry cannot be split evenly.
    pub fn build_assigner(&self, seed: Option<u64>) -> Result<Option<Box<dyn CapAssigner>>> {
        match self.collector {
            CollectorType::None => Ok(None),
            CollectorType::WellPlate96 => {
                let slots = self
                    .slots
                    .iter()
                    .map(|s| {
                        GridSlot::evenly_split(s.filter.clone(), s.quantity, s.wells.unwrap_or(1))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let generator =
                    seed.map_or_else(WellLabelGenerator::from_os_rng, WellLabelGenerator::seeded);
                let assigner: Box<dyn CapAssigner> =
                    Box::new(WellPlateAssigner::new(slots, generator));
                Ok(Some(assigner))
            }
            collector => {
                let defaults = collector.default_labels();
                let slots = self
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(index, s)| {
                        let label = s
                            .label
                            .clone()
                            .or_else(|| defaults.get(index).cloned())
                            .unwrap_or_else(|| (index + 1).to_string());
                        VesselSlot::new(label, s.filter.clone(), s.quantity)
                    })
                    .collect();
                let assigner: Box<dyn CapAssigner> = Box::new(StandardAssigner::new(slots));
                Ok(Some(assigner))
            }
        }
    }
}

fn default_true() -> bool {
    true
}

/// Parameters of one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Reorder shapes to shorten laser travel.
    #[serde(default = "default_true")]
    pub optimize_order: bool,
    /// Write the per-class summary next to the XML.
    #[serde(default = "default_true")]
    pub write_summary: bool,
    /// Where the intermediate GeoJSON goes; defaults to the output
    /// directory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            optimize_order: true,
            write_summary: true,
            temp_dir: None,
            seed: None,
        }
    }
}

impl ExportOptions {
    /// Loads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radius_uses_pixel_size() {
        let options = ExpansionOptions {
            radius_microns: 6.0,
            pixel_size_microns: Some(0.5),
            ..ExpansionOptions::default()
        };
        assert_relative_eq!(options.radius_pixels(), 12.0);
        let uncalibrated = ExpansionOptions {
            radius_microns: 6.0,
            ..ExpansionOptions::default()
        };
        assert_relative_eq!(uncalibrated.radius_pixels(), 6.0);
    }

    #[test]
    fn expansion_options_from_json() {
        let options: ExpansionOptions = serde_json::from_str(
            r#"{"radius_microns": 2.5, "different_class": {"priority": ["Tumor", "Stroma"]}}"#,
        )
        .unwrap();
        assert_relative_eq!(options.radius_microns, 2.5);
        assert_eq!(options.same_class, SameClassPolicy::Merge);
        assert_eq!(options.different_class.ranking(), ["Tumor", "Stroma"]);
    }

    #[test]
    fn collector_names_parse() {
        assert_eq!("PCR Tubes".parse::<CollectorType>().unwrap(), CollectorType::PcrTubes);
        assert_eq!(
            "96-well plate".parse::<CollectorType>().unwrap(),
            CollectorType::WellPlate96
        );
        assert!(matches!(
            "Beaker".parse::<CollectorType>().unwrap_err(),
            LmdError::Configuration(ConfigurationError::UnknownCollector(_))
        ));
    }

    #[test]
    fn default_labels_per_collector() {
        assert_eq!(CollectorType::PcrTubes.default_labels(), ["A", "B", "C", "D", "E"]);
        assert_eq!(CollectorType::EightFoldStrip.default_labels().len(), 8);
        assert_eq!(CollectorType::TwelveFoldStrip.default_labels().last().unwrap(), "L");
        assert_eq!(CollectorType::PetriDishes.default_labels(), ["A", "B"]);
        assert!(CollectorType::WellPlate96.default_labels().is_empty());
    }

    #[test]
    fn collector_table_builds_standard_assigner() {
        let config: CollectorConfig = serde_json::from_str(
            r#"{
                "collector": "8-Fold Strip",
                "slots": [
                    {"filter": "Tumor", "quantity": 1},
                    {"filter": null, "quantity": 4},
                    {"label": "H", "filter": "Remaining", "quantity": 2}
                ]
            }"#,
        )
        .unwrap();
        let mut assigner = config.build_assigner(None).unwrap().unwrap();
        assert_eq!(assigner.assign(Some("Tumor")).unwrap().as_deref(), Some("A"));
        assert_eq!(assigner.assign(Some("Tumor")).unwrap().as_deref(), Some("H"));
        assert!(assigner.is_classified());
    }

    #[test]
    fn uneven_well_plate_table_is_rejected() {
        let config = CollectorConfig {
            collector: CollectorType::WellPlate96,
            slots: vec![SlotConfig {
                label: None,
                filter: Some(SlotFilter::AllObjects),
                quantity: 7,
                wells: Some(2),
            }],
        };
        assert!(matches!(
            config.build_assigner(Some(1)),
            Err(LmdError::Configuration(ConfigurationError::UnevenWellSplit { .. }))
        ));
    }

    #[test]
    fn no_collector_no_assigner() {
        assert!(CollectorConfig::default().build_assigner(None).unwrap().is_none());
    }

    #[test]
    fn export_defaults() {
        let options: ExportOptions = serde_json::from_str("{}").unwrap();
        assert!(options.optimize_order);
        assert!(options.write_summary);
        assert_eq!(options.collector.collector, CollectorType::None);
    }
}
