use crate::error::{Result, UserInputError};
use crate::geometry::{Roi, Shape};
use crate::math::Point2;

use super::geojson::{Feature, Geometry};

/// Names of the three calibration markers, in output order.
pub const CALIBRATION_NAMES: [&str; 3] = ["calibration1", "calibration2", "calibration3"];

/// The three reference points the microscope uses to register the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoints([Point2; 3]);

impl CalibrationPoints {
    #[must_use]
    pub fn new(points: [Point2; 3]) -> Self {
        Self(points)
    }

    #[must_use]
    pub fn points(&self) -> &[Point2; 3] {
        &self.0
    }

    /// Finds the calibration markers among point features. Names are
    /// matched case-insensitively; when a name occurs twice the first one
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`UserInputError::MissingCalibration`] listing the markers
    /// that were found if any of the three is absent.
    pub fn from_features(features: &[Feature]) -> Result<Self> {
        Self::collect(features.iter().filter_map(|f| match &f.geometry {
            Geometry::Point { coordinates } => f
                .properties
                .name
                .as_deref()
                .map(|name| (name, Point2::from(*coordinates))),
            _ => None,
        }))
    }

    /// Finds the calibration markers among point shapes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_features`].
    pub fn from_shapes<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> Result<Self> {
        Self::collect(shapes.into_iter().filter_map(|s| match (&s.roi, &s.name) {
            (Roi::Point(p), Some(name)) => Some((name.as_str(), *p)),
            _ => None,
        }))
    }

    /// Point annotations carrying the marker names, for writing back out.
    #[must_use]
    pub fn to_shapes(&self) -> Vec<Shape> {
        CALIBRATION_NAMES
            .iter()
            .zip(self.0)
            .map(|(name, p)| Shape::point(p.x, p.y).with_name(*name))
            .collect()
    }

    fn collect<'a>(candidates: impl Iterator<Item = (&'a str, Point2)>) -> Result<Self> {
        let mut found: [Option<Point2>; 3] = [None; 3];
        for (name, point) in candidates {
            let slot = CALIBRATION_NAMES
                .iter()
                .position(|expected| name.eq_ignore_ascii_case(expected));
            if let Some(i) = slot {
                found[i].get_or_insert(point);
            }
        }
        match found {
            [Some(a), Some(b), Some(c)] => Ok(Self([a, b, c])),
            _ => Err(UserInputError::MissingCalibration {
                found: CALIBRATION_NAMES
                    .iter()
                    .zip(found)
                    .filter(|(_, p)| p.is_some())
                    .map(|(name, _)| (*name).to_owned())
                    .collect(),
            }
            .into()),
        }
    }
}
