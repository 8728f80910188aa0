use std::fmt;

use geo::{Area, Centroid, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::math::Point2;

/// Whether a shape is a free-form annotation or a collectible detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Annotation,
    Detection,
}

/// The region of interest carried by a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Roi {
    /// A polygonal area, possibly multi-part once merged.
    Area(MultiPolygon<f64>),
    /// A single point, used for calibration markers.
    Point(Point2),
}

/// The z-slice and timepoint a shape lives on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagePlane {
    pub z: i32,
    pub t: i32,
}

impl ImagePlane {
    /// Creates a plane at the given z-slice and timepoint.
    #[must_use]
    pub fn new(z: i32, t: i32) -> Self {
        Self { z, t }
    }
}

impl fmt::Display for ImagePlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z={}, t={}", self.z, self.t)
    }
}

/// RGB display color, serialised as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

/// A 2D region with its classification metadata.
///
/// Shapes are values: identity inside a store comes from its key, and every
/// geometric operation returns a new shape instead of editing one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub roi: Roi,
    pub class: Option<String>,
    pub name: Option<String>,
    pub color: Option<Color>,
    pub plane: ImagePlane,
}

impl Shape {
    /// Creates an unclassified detection covering `polygon`.
    #[must_use]
    pub fn detection(polygon: Polygon<f64>) -> Self {
        Self::new(ShapeKind::Detection, Roi::Area(MultiPolygon::new(vec![polygon])))
    }

    /// Creates an unclassified area annotation covering `polygon`.
    #[must_use]
    pub fn annotation(polygon: Polygon<f64>) -> Self {
        Self::new(ShapeKind::Annotation, Roi::Area(MultiPolygon::new(vec![polygon])))
    }

    /// Creates a point annotation.
    #[must_use]
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(ShapeKind::Annotation, Roi::Point(Point2::new(x, y)))
    }

    /// Creates a shape with no class, name or color on the default plane.
    #[must_use]
    pub fn new(kind: ShapeKind, roi: Roi) -> Self {
        Self {
            kind,
            roi,
            class: None,
            name: None,
            color: None,
            plane: ImagePlane::default(),
        }
    }

    /// Sets the class label.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the display color.
    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Moves the shape to another image plane.
    #[must_use]
    pub fn with_plane(mut self, plane: ImagePlane) -> Self {
        self.plane = plane;
        self
    }

    /// Returns a copy carrying the same metadata but a different region.
    #[must_use]
    pub fn with_roi(&self, roi: Roi) -> Self {
        Self {
            kind: self.kind,
            roi,
            class: self.class.clone(),
            name: self.name.clone(),
            color: self.color,
            plane: self.plane,
        }
    }

    #[must_use]
    pub fn is_area(&self) -> bool {
        matches!(self.roi, Roi::Area(_))
    }

    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self.roi, Roi::Point(_))
    }

    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.kind == ShapeKind::Annotation
    }

    #[must_use]
    pub fn is_detection(&self) -> bool {
        self.kind == ShapeKind::Detection
    }

    /// Returns the class label, if any.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Returns the polygonal region, or `None` for point shapes.
    #[must_use]
    pub fn polygons(&self) -> Option<&MultiPolygon<f64>> {
        match &self.roi {
            Roi::Area(polygons) => Some(polygons),
            Roi::Point(_) => None,
        }
    }

    /// Unsigned area in square pixels; zero for points.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygons().map_or(0.0, |p| p.unsigned_area())
    }

    /// Center of mass of the region, or the point itself.
    #[must_use]
    pub fn centroid(&self) -> Option<Point2> {
        match &self.roi {
            Roi::Area(polygons) => polygons.centroid().map(|c| Point2::new(c.x(), c.y())),
            Roi::Point(p) => Some(*p),
        }
    }
}
