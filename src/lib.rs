pub mod assignment;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod math;
pub mod operations;
pub mod store;

pub use error::{LmdError, Result};
