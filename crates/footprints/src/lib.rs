//! Building footprint pipeline: satellite raster acquisition, remote detection
//! and GeoJSON export formatting.

pub mod client;
pub mod coords;
pub mod errors;
pub mod formatter;
pub mod imagery;
pub mod paths;
pub mod store;
pub mod types;

pub use client::{DetectionClient, RawDetection};
pub use coords::transform;
pub use errors::{FootprintError, Result};
pub use formatter::{clean_projection, osm_projection, parse_custom_tags};
pub use imagery::{CommandImagery, ImageryProvider, TileRequest, acquire_satellite};
pub use store::{ArtifactStore, CleanupReport, RasterArtifact, RasterSlot};
pub use types::{BoundingBox, LatLon, LonLat};
