use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result};
use crate::geometry::Shape;
use crate::operations::priority::{area_by_class, count_by_class};

/// Per-class bookkeeping written next to the cutting instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    #[serde(rename = "Well labels by class")]
    pub labels_by_class: BTreeMap<String, Vec<String>>,
    #[serde(rename = "Shapes count by class")]
    pub count_by_class: BTreeMap<String, usize>,
    /// Square pixels.
    #[serde(rename = "Shapes area by class")]
    pub area_by_class: BTreeMap<String, f64>,
}

impl ExportSummary {
    #[must_use]
    pub fn new(labels_by_class: BTreeMap<String, Vec<String>>, shapes: &[Shape]) -> Self {
        Self {
            labels_by_class,
            count_by_class: count_by_class(shapes),
            area_by_class: area_by_class(shapes),
        }
    }

    /// Writes the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn keys_match_the_collector_software() {
        let shapes = vec![
            Shape::detection(polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)])
                .with_class("Tumor"),
            Shape::detection(polygon![(x: 5.0, y: 0.0), (x: 6.0, y: 0.0), (x: 6.0, y: 1.0), (x: 5.0, y: 1.0)])
                .with_class("Tumor"),
        ];
        let labels = BTreeMap::from([("Tumor".to_owned(), vec!["C7".to_owned()])]);
        let summary = ExportSummary::new(labels, &shapes);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        summary.write(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["Well labels by class"]["Tumor"][0], "C7");
        assert_eq!(json["Shapes count by class"]["Tumor"], 2);
        assert_eq!(json["Shapes area by class"]["Tumor"], 5.0);
    }
}
