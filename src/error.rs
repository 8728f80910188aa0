use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::ImagePlane;

/// Top-level error type for the lmdcut pipeline.
#[derive(Debug, Error)]
pub enum LmdError {
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Problems with what the user selected or supplied. Nothing is mutated
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum UserInputError {
    #[error("no shapes are selected")]
    NoSelection,

    #[error("the selection contains no expandable detection shapes")]
    NoEligibleShapes,

    #[error("expansion radius must be a finite, non-negative number, got {0}")]
    InvalidRadius(f64),

    #[error("expected 3 point features named calibration1..3, found {found:?}")]
    MissingCalibration { found: Vec<String> },

    #[error("invalid feature: {0}")]
    InvalidFeature(String),
}

/// Errors raised by polygon computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("cannot merge shapes from different image planes ({expected} vs {found})")]
    PlaneMismatch {
        expected: ImagePlane,
        found: ImagePlane,
    },

    #[error("merge requires at least one area shape")]
    EmptyMerge,

    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Errors in the collector or vessel configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown collector type: {0}")]
    UnknownCollector(String),

    #[error("slot {label} has no class filter")]
    MissingFilter { label: String },

    #[error("{quantity} objects cannot be split evenly across {wells} wells")]
    UnevenWellSplit { quantity: u32, wells: u32 },

    #[error("{wells} wells requested for only {quantity} objects")]
    TooManyWells { quantity: u32, wells: u32 },

    #[error("all 96 well labels are already in use")]
    WellLabelsExhausted,
}

/// Errors reading or writing files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<serde_json::Error> for LmdError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(IoError::Json(err))
    }
}

impl From<quick_xml::Error> for LmdError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Io(IoError::Xml(err))
    }
}

/// Convenience type alias for results using [`LmdError`].
pub type Result<T> = std::result::Result<T, LmdError>;
