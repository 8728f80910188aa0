use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::{LineString, MultiPolygon, Polygon};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IoError, Result, UserInputError};
use crate::geometry::{Color, Roi, Shape, ShapeKind};
use crate::math::polygon_2d::{close_ring, line_string_points, points_line_string, signed_area_2d};
use crate::math::{Point2, TOLERANCE};
use crate::store::{ShapeHierarchy, ShapeStore};

/// A GeoJSON position. Written as `[x, y]`; any further components such as
/// an elevation are accepted on reading and dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<Point2> for Position {
    fn from(p: Point2) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Position> for Point2 {
    fn from(p: Position) -> Self {
        Point2::new(p.x, p.y)
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.x, self.y].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        match values.as_slice() {
            [x, y, ..] => Ok(Self::new(*x, *y)),
            _ => Err(de::Error::invalid_length(values.len(), &"at least 2 coordinates")),
        }
    }
}

/// Feature geometry. Only the kinds the pipeline produces are modelled;
/// anything else is read as [`Geometry::Unsupported`] and skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

impl Geometry {
    /// The first ring of the geometry, as listed in the file.
    ///
    /// For a polygon this is its exterior, for a multipolygon the exterior of
    /// the first part, and for a point the point itself.
    #[must_use]
    pub fn first_ring(&self) -> Option<Vec<Point2>> {
        let ring = match self {
            Self::Point { coordinates } => return Some(vec![Point2::from(*coordinates)]),
            Self::Polygon { coordinates } => coordinates.first()?,
            Self::MultiPolygon { coordinates } => coordinates.first()?.first()?,
            Self::MultiPoint { .. } | Self::Unsupported => return None,
        };
        Some(ring.iter().copied().map(Point2::from).collect())
    }
}

/// The class attached to a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(rename = "objectType", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Properties this crate does not interpret, kept for the round trip.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Properties {
    /// Annotations are everything explicitly typed as such; features with
    /// any other or no object type are exported as cut shapes.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.object_type.as_deref() == Some("annotation")
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.classification.as_ref().map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Properties,
}

impl Feature {
    /// Builds a feature from a shape. Area shapes with a single part become
    /// `Polygon`s, merged shapes `MultiPolygon`s.
    #[must_use]
    pub fn from_shape(shape: &Shape) -> Self {
        let geometry = match &shape.roi {
            Roi::Point(p) => Geometry::Point {
                coordinates: Position::from(*p),
            },
            Roi::Area(polygons) => match polygons.0.as_slice() {
                [single] => Geometry::Polygon {
                    coordinates: polygon_rings(single),
                },
                parts => Geometry::MultiPolygon {
                    coordinates: parts.iter().map(polygon_rings).collect(),
                },
            },
        };
        let object_type = match shape.kind {
            ShapeKind::Annotation => "annotation",
            ShapeKind::Detection => "detection",
        };
        Self {
            kind: "Feature".to_owned(),
            geometry,
            properties: Properties {
                object_type: Some(object_type.to_owned()),
                name: shape.name.clone(),
                classification: shape.class.as_ref().map(|name| Classification {
                    name: name.clone(),
                    color: shape.color,
                }),
                extra: serde_json::Map::new(),
            },
        }
    }

    /// Builds a shape from this feature. Returns `Ok(None)` for geometry
    /// kinds that have no shape counterpart.
    ///
    /// # Errors
    ///
    /// Returns [`UserInputError::InvalidFeature`] if a polygon has no rings
    /// or a ring encloses no area.
    pub fn to_shape(&self) -> Result<Option<Shape>> {
        let roi = match &self.geometry {
            Geometry::Point { coordinates } => Roi::Point(Point2::from(*coordinates)),
            Geometry::Polygon { coordinates } => {
                Roi::Area(MultiPolygon::new(vec![rings_polygon(coordinates)?]))
            }
            Geometry::MultiPolygon { coordinates } => Roi::Area(MultiPolygon::new(
                coordinates
                    .iter()
                    .map(|rings| rings_polygon(rings))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Geometry::MultiPoint { .. } | Geometry::Unsupported => return Ok(None),
        };
        let kind = if self.properties.is_annotation() {
            ShapeKind::Annotation
        } else {
            ShapeKind::Detection
        };
        let mut shape = Shape::new(kind, roi);
        shape.name.clone_from(&self.properties.name);
        if let Some(classification) = &self.properties.classification {
            shape.class = Some(classification.name.clone());
            shape.color = classification.color;
        }
        Ok(Some(shape))
    }
}

/// A GeoJSON feature collection as exchanged with the image viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_owned(),
            features,
        }
    }

    #[must_use]
    pub fn from_shapes<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> Self {
        Self::new(shapes.into_iter().map(Feature::from_shape).collect())
    }

    /// Reads a collection from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a feature
    /// collection.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the collection to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path).map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(BufWriter::new(file), path)
    }

    pub(crate) fn write_to<W: Write>(&self, mut out: W, path: &Path) -> Result<()> {
        serde_json::to_writer_pretty(&mut out, self)?;
        out.flush().map_err(|source| IoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Converts every supported feature into a flat store.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid feature.
    pub fn into_store(&self) -> Result<ShapeStore> {
        let mut store = ShapeStore::new();
        for feature in &self.features {
            if let Some(shape) = feature.to_shape()? {
                store.insert(shape);
            }
        }
        Ok(store)
    }

    /// Collects every shape of a hierarchy, annotations included.
    #[must_use]
    pub fn from_hierarchy<H: ShapeHierarchy + ?Sized>(hierarchy: &H) -> Self {
        let ids = hierarchy.all_shapes(true);
        Self::from_shapes(ids.into_iter().filter_map(|id| hierarchy.shape(id)))
    }
}

fn ring_positions(ring: &LineString<f64>) -> Vec<Position> {
    close_ring(&line_string_points(ring))
        .into_iter()
        .map(Position::from)
        .collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_positions)
        .collect()
}

fn rings_polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let mut lines = rings.iter().map(|ring| {
        let points: Vec<Point2> = ring.iter().copied().map(Point2::from).collect();
        if signed_area_2d(&points).abs() < TOLERANCE {
            return Err(UserInputError::InvalidFeature(format!(
                "ring of {} positions encloses no area",
                points.len()
            )));
        }
        Ok(points_line_string(&close_ring(&points)))
    });
    let exterior = lines
        .next()
        .ok_or_else(|| UserInputError::InvalidFeature("polygon without rings".to_owned()))??;
    let interiors = lines.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}
