use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ExportOptions;
use crate::error::{IoError, Result, UserInputError};
use crate::geometry::Shape;
use crate::operations::polygon::to_closed_ring;
use crate::store::{ShapeHierarchy, ShapeId};

use super::calibration::CalibrationPoints;
use super::geojson::{Feature, FeatureCollection, Geometry, Position};
use super::order::nearest_neighbour_order;
use super::summary::ExportSummary;
use super::xml::GeojsonToXml;

/// Which shapes an export covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportScope {
    /// Selected non-annotation shapes.
    #[default]
    Selected,
    /// Every non-annotation shape in the hierarchy.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub shape_count: usize,
    pub unassigned: usize,
    pub xml_path: PathBuf,
    pub summary_path: Option<PathBuf>,
}

/// Exports shapes of a hierarchy as laser microdissection cutting
/// instructions.
///
/// Shapes are optionally reordered for shorter laser travel, written together
/// with the calibration markers to an intermediate GeoJSON file, and that file
/// is converted to XML while a fresh assigner hands out collector labels. The
/// intermediate file is removed afterwards.
pub struct ExportLmd<'a> {
    options: &'a ExportOptions,
    scope: ExportScope,
}

impl<'a> ExportLmd<'a> {
    /// Creates a new `ExportLmd` operation exporting the selection.
    #[must_use]
    pub fn new(options: &'a ExportOptions) -> Self {
        Self {
            options,
            scope: ExportScope::default(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ExportScope) -> Self {
        self.scope = scope;
        self
    }

    /// Executes the export, writing the XML to `output`.
    ///
    /// # Errors
    ///
    /// Returns a [`UserInputError`] without writing anything if there is
    /// nothing to export or a calibration marker is missing, and an I/O or
    /// configuration error otherwise.
    pub fn execute<H>(&self, hierarchy: &H, output: &Path) -> Result<ExportReport>
    where
        H: ShapeHierarchy + ?Sized,
    {
        let ids = match self.scope {
            ExportScope::Selected => {
                let selected = hierarchy.selected_shapes();
                if selected.is_empty() {
                    return Err(UserInputError::NoSelection.into());
                }
                selected
            }
            ExportScope::All => hierarchy.all_shapes(false),
        };
        let shapes: Vec<Shape> = resolve(hierarchy, &ids)
            .filter(|s| !s.is_annotation())
            .cloned()
            .collect();
        if shapes.is_empty() {
            return Err(UserInputError::NoEligibleShapes.into());
        }

        let annotations = hierarchy.all_shapes(true);
        let calibration = CalibrationPoints::from_shapes(
            resolve(hierarchy, &annotations).filter(|s| s.is_annotation()),
        )?;

        let shapes = if self.options.optimize_order {
            nearest_neighbour_order(shapes)
        } else {
            shapes
        };

        let mut features: Vec<Feature> =
            calibration.to_shapes().iter().map(Feature::from_shape).collect();
        features.extend(shapes.iter().map(cut_feature));
        let collection = FeatureCollection::new(features);

        let temp_dir = self.temp_dir(output);
        let mut temp = tempfile::Builder::new()
            .prefix("lmdcut-")
            .suffix(".geojson")
            .tempfile_in(&temp_dir)
            .map_err(|source| IoError::Write {
                path: temp_dir.clone(),
                source,
            })?;
        let temp_path = temp.path().to_path_buf();
        collection.write_to(BufWriter::new(temp.as_file_mut()), &temp_path)?;

        let mut assigner = self.options.collector.build_assigner(self.options.seed)?;
        let conversion = GeojsonToXml::new(&temp_path, output).execute(assigner.as_deref_mut());
        if let Err(err) = temp.close() {
            warn!(path = %temp_path.display(), "failed to remove intermediate GeoJSON: {err}");
        }
        let conversion = conversion?;

        let summary_path = match &assigner {
            Some(assigner) if self.options.write_summary && assigner.is_classified() => {
                let path = self.summary_path(output);
                ExportSummary::new(assigner.labels_by_class(), &shapes).write(&path)?;
                Some(path)
            }
            _ => None,
        };

        info!(
            shapes = conversion.shape_count,
            unassigned = conversion.unassigned,
            collector = %self.options.collector.collector,
            output = %output.display(),
            "export finished"
        );
        Ok(ExportReport {
            shape_count: conversion.shape_count,
            unassigned: conversion.unassigned,
            xml_path: output.to_path_buf(),
            summary_path,
        })
    }

    fn temp_dir(&self, output: &Path) -> PathBuf {
        match (&self.options.temp_dir, output.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            (None, _) => PathBuf::from("."),
        }
    }

    /// `<stem>_<suffix>` next to the XML, the suffix naming the collector.
    fn summary_path(&self, output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map_or_else(|| "export".into(), |s| s.to_string_lossy());
        let suffix = self.options.collector.collector.summary_file_suffix();
        output.with_file_name(format!("{stem}_{suffix}"))
    }
}

fn resolve<'h, H>(hierarchy: &'h H, ids: &'h [ShapeId]) -> impl Iterator<Item = &'h Shape> + 'h
where
    H: ShapeHierarchy + ?Sized,
{
    ids.iter().filter_map(|&id| hierarchy.shape(id))
}

/// The feature the microscope cuts: the closed outline of the shape's
/// largest part.
fn cut_feature(shape: &Shape) -> Feature {
    let mut feature = Feature::from_shape(shape);
    if shape.is_area() {
        feature.geometry = Geometry::Polygon {
            coordinates: vec![to_closed_ring(shape).into_iter().map(Position::from).collect()],
        };
    }
    feature
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assignment::SlotFilter;
    use crate::config::{CollectorConfig, CollectorType, SlotConfig};
    use crate::error::LmdError;
    use crate::geometry::Roi;
    use crate::store::ShapeStore;
    use geo::polygon;
    use std::fs;

    fn cell(x: f64, class: &str) -> Shape {
        Shape::detection(polygon![
            (x: x, y: 0.0),
            (x: x + 2.0, y: 0.0),
            (x: x + 2.0, y: 2.0),
            (x: x, y: 2.0)
        ])
        .with_class(class)
    }

    fn calibrated_store(markers: usize) -> ShapeStore {
        let mut store = ShapeStore::new();
        let positions = [("calibration1", 0.0), ("calibration2", 100.0), ("calibration3", 200.0)];
        for (name, x) in positions.into_iter().take(markers) {
            store.insert(Shape::point(x, 0.0).with_name(name));
        }
        store
    }

    fn options(dir: &Path, collector: CollectorConfig) -> ExportOptions {
        ExportOptions {
            collector,
            temp_dir: Some(dir.to_path_buf()),
            seed: Some(3),
            ..ExportOptions::default()
        }
    }

    fn tumor_table() -> CollectorConfig {
        CollectorConfig {
            collector: CollectorType::PcrTubes,
            slots: vec![
                SlotConfig {
                    label: None,
                    filter: Some(SlotFilter::Class("Tumor".into())),
                    quantity: 10,
                    wells: None,
                },
                SlotConfig {
                    label: None,
                    filter: Some(SlotFilter::RemainingObjects),
                    quantity: 10,
                    wells: None,
                },
            ],
        }
    }

    fn count_tag(xml: &str, tag: &str) -> usize {
        xml.matches(&format!("<{tag}>")).count()
    }

    #[test]
    fn exports_all_detections_with_caps_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = calibrated_store(3);
        for i in 0..4 {
            let class = if i % 2 == 0 { "Tumor" } else { "Stroma" };
            store.insert(cell(f64::from(i) * 10.0, class));
        }
        let output = dir.path().join("slide.xml");

        let opts = options(dir.path(), tumor_table());
        let report = ExportLmd::new(&opts)
            .with_scope(ExportScope::All)
            .execute(&store, &output)
            .unwrap();

        assert_eq!(report.shape_count, 4);
        assert_eq!(report.unassigned, 0);
        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("<ShapeCount>4</ShapeCount>"));
        assert_eq!(count_tag(&xml, "PointCount"), 4);
        assert!(xml.contains("<PointCount>5</PointCount>"));
        assert_eq!(xml.matches("<CapID>A</CapID>").count(), 2);
        assert_eq!(xml.matches("<CapID>B</CapID>").count(), 2);

        let summary_path = report.summary_path.unwrap();
        assert_eq!(
            summary_path.file_name().unwrap(),
            "slide_well_data_pcr_tubes.json"
        );
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(summary_path).unwrap()).unwrap();
        assert_eq!(summary["Shapes count by class"]["Tumor"], 2);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "geojson"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_calibration_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("slide.xml");
        for markers in 0..3 {
            let mut store = calibrated_store(markers);
            store.insert(cell(0.0, "Tumor"));
            let opts = options(dir.path(), CollectorConfig::default());
            let err = ExportLmd::new(&opts)
                .with_scope(ExportScope::All)
                .execute(&store, &output)
                .unwrap_err();
            assert!(matches!(
                err,
                LmdError::UserInput(UserInputError::MissingCalibration { .. })
            ));
            assert!(!output.exists());
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn selection_scope_needs_a_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = calibrated_store(3);
        let id = store.insert(cell(0.0, "Tumor"));
        store.insert(cell(10.0, "Tumor"));
        let output = dir.path().join("slide.xml");
        let opts = options(dir.path(), CollectorConfig::default());

        let err = ExportLmd::new(&opts).execute(&store, &output).unwrap_err();
        assert!(matches!(err, LmdError::UserInput(UserInputError::NoSelection)));

        store.select(id);
        let report = ExportLmd::new(&opts).execute(&store, &output).unwrap();
        assert_eq!(report.shape_count, 1);
        assert_eq!(report.unassigned, 1);
        assert!(report.summary_path.is_none());
        assert!(!fs::read_to_string(&output).unwrap().contains("CapID"));
    }

    #[test]
    fn merged_shapes_export_their_largest_part() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = calibrated_store(3);
        let merged = Shape::detection(polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0)
        ]);
        let mut parts = merged.polygons().unwrap().clone();
        parts.0.push(polygon![(x: 10.0, y: 0.0), (x: 11.0, y: 0.0), (x: 11.0, y: 1.0)]);
        store.insert(merged.with_roi(Roi::Area(parts)));
        let output = dir.path().join("slide.xml");

        let opts = options(dir.path(), CollectorConfig::default());
        ExportLmd::new(&opts)
            .with_scope(ExportScope::All)
            .execute(&store, &output)
            .unwrap();
        let xml = fs::read_to_string(&output).unwrap();
        assert!(xml.contains("<ShapeCount>1</ShapeCount>"));
        assert!(xml.contains("<PointCount>5</PointCount>"));
    }
}
