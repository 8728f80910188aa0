mod absorb;
mod convert;
mod expand_shapes;
mod mirror;
pub mod polygon;
pub mod priority;
mod resolve;

pub use absorb::{AbsorbBackground, ENVELOPE_FACTOR};
pub use convert::ConvertShapes;
pub use expand_shapes::{ExpandShapes, ExpansionReport};
pub use mirror::MirrorShapes;
pub use priority::ClassPriority;
pub use resolve::{Resolution, ResolveOverlaps};
