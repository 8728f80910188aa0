mod boolean;
mod expand;
mod merge;
mod overlap;
mod ring;

pub use boolean::union_all;
pub use expand::Expand;
pub use merge::Merge;
pub use overlap::shapes_overlap;
pub use ring::to_closed_ring;
