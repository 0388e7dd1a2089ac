//! Flood-extent mapping over digital elevation models.
//!
//! Rasters are loaded through [`io`], conditioned by [`conditioning`],
//! flooded from a seed point by [`flood`] and traced into polygons by
//! [`vectorize`]. [`pipeline`] strings the stages together for one run.
pub mod conditioning;
pub mod config;
pub mod dem;
pub mod error;
pub mod flood;
pub mod io;
pub mod pipeline;
pub mod synthetic;
pub mod transform;
pub mod vectorize;

pub use dem::{Dem, DemSummary, Mask};
pub use error::{Error, Result};
pub use flood::{Connectivity, FloodExtent, FloodStats};
pub use transform::{GeoTransform, GridExtent};
