use std::fs;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, warn};

use crate::assignment::CapAssigner;
use crate::error::{IoError, Result};
use crate::math::Point2;

use super::calibration::CalibrationPoints;
use super::geojson::FeatureCollection;

/// One shape as the microscope cuts it: an outline and an optional
/// collector position.
#[derive(Debug, Clone, PartialEq)]
pub struct CutShape {
    pub points: Vec<Point2>,
    pub cap_id: Option<String>,
}

/// Writes the cutting instructions as an `ImageData` document.
///
/// Coordinates are written with Rust's shortest round-trip float format,
/// which never depends on the locale and always keeps a decimal point
/// (`100.0`, `12.5`).
///
/// # Errors
///
/// Returns an error if `out` fails.
pub fn write_lmd_xml<W: Write>(
    out: W,
    calibration: &CalibrationPoints,
    shapes: &[CutShape],
) -> Result<W> {
    let mut writer = Writer::new_with_indent(out, b' ', 4);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("no"))))?;
    writer.write_event(Event::Start(BytesStart::new("ImageData")))?;

    for (i, point) in calibration.points().iter().enumerate() {
        text_element(&mut writer, &format!("X_CalibrationPoint_{}", i + 1), &number(point.x))?;
        text_element(&mut writer, &format!("Y_CalibrationPoint_{}", i + 1), &number(point.y))?;
    }
    text_element(&mut writer, "ShapeCount", &shapes.len().to_string())?;

    for (n, shape) in shapes.iter().enumerate() {
        let tag = format!("Shape_{}", n + 1);
        writer.write_event(Event::Start(BytesStart::new(tag.as_str())))?;
        text_element(&mut writer, "PointCount", &shape.points.len().to_string())?;
        if let Some(cap) = &shape.cap_id {
            text_element(&mut writer, "CapID", cap)?;
        }
        for (i, point) in shape.points.iter().enumerate() {
            text_element(&mut writer, &format!("X_{}", i + 1), &number(point.x))?;
            text_element(&mut writer, &format!("Y_{}", i + 1), &number(point.y))?;
        }
        writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    }

    writer.write_event(Event::End(BytesEnd::new("ImageData")))?;
    Ok(writer.into_inner())
}

fn text_element<W: Write>(writer: &mut Writer<W>, tag: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn number(value: f64) -> String {
    format!("{value:?}")
}

/// Result of converting one feature file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub shape_count: usize,
    /// Shapes written without a `CapID`.
    pub unassigned: usize,
}

/// Converts a GeoJSON feature collection into microscope cutting
/// instructions.
///
/// Every feature that is not an annotation becomes one `Shape_n` holding the
/// first ring of its geometry, in file order. When an assigner is given each
/// shape asks it for a collector label using its class.
pub struct GeojsonToXml<'a> {
    input: &'a Path,
    output: &'a Path,
}

impl<'a> GeojsonToXml<'a> {
    /// Creates a new `GeojsonToXml` operation.
    #[must_use]
    pub fn new(input: &'a Path, output: &'a Path) -> Self {
        Self { input, output }
    }

    /// Executes the conversion. The output file is only created once the
    /// whole document has been built.
    ///
    /// # Errors
    ///
    /// Returns [`UserInputError::MissingCalibration`] if the three markers
    /// are not all present, and an I/O or assignment error otherwise. No
    /// file is written on error.
    ///
    /// [`UserInputError::MissingCalibration`]: crate::error::UserInputError::MissingCalibration
    pub fn execute(
        &self,
        mut assigner: Option<&mut (dyn CapAssigner + '_)>,
    ) -> Result<ConversionReport> {
        let collection = FeatureCollection::read(self.input)?;
        let calibration = CalibrationPoints::from_features(&collection.features)?;

        let mut report = ConversionReport::default();
        let mut shapes = Vec::new();
        for feature in collection.features.iter().filter(|f| !f.properties.is_annotation()) {
            let Some(points) = feature.geometry.first_ring() else {
                warn!(name = ?feature.properties.name, "skipping feature without a ring");
                continue;
            };
            let cap_id = match assigner.as_deref_mut() {
                Some(assigner) => assigner.assign(feature.properties.class_name())?,
                None => None,
            };
            if cap_id.is_none() {
                report.unassigned += 1;
            }
            shapes.push(CutShape { points, cap_id });
        }
        report.shape_count = shapes.len();

        let bytes = write_lmd_xml(Vec::new(), &calibration, &shapes)?;
        fs::write(self.output, bytes).map_err(|source| IoError::Write {
            path: self.output.to_path_buf(),
            source,
        })?;
        debug!(
            shapes = report.shape_count,
            unassigned = report.unassigned,
            output = %self.output.display(),
            "wrote cutting instructions"
        );
        Ok(report)
    }
}
