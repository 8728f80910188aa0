pub mod polygon_2d;

/// 2D point type in image pixel coordinates.
pub type Point2 = nalgebra::Point2<f64>;

/// Homogeneous coordinates of a 2D point.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 homogeneous transformation matrix for 2D affine maps.
pub type Matrix3 = nalgebra::Matrix3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Overlap area (in square pixels) below which two regions only touch.
pub const AREA_TOLERANCE: f64 = 1e-9;

/// Number of segments used to approximate a quarter circle when buffering.
pub const QUADRANT_SEGMENTS: usize = 8;
