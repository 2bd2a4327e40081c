pub mod geo;
pub mod tracing;

pub use geo::*;
pub use tracing::*;
