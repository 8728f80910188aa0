mod shape;

pub use shape::{Color, ImagePlane, Roi, Shape, ShapeKind};
