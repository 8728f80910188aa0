//! Export of shapes as laser microdissection cutting instructions.
//!
//! Shapes travel through a GeoJSON feature collection (the image viewer's
//! exchange format) and end up in the `ImageData` XML document read by the
//! microscope, optionally with a collector position per shape.

mod calibration;
mod export_lmd;
pub mod geojson;
mod order;
mod summary;
mod xml;

pub use calibration::{CalibrationPoints, CALIBRATION_NAMES};
pub use export_lmd::{ExportLmd, ExportReport, ExportScope};
pub use geojson::{Feature, FeatureCollection};
pub use order::nearest_neighbour_order;
pub use summary::ExportSummary;
pub use xml::{write_lmd_xml, ConversionReport, CutShape, GeojsonToXml};
