use crate::types::{LatLon, LonLat};

/// Swap map annotation points into the detector's `[lon, lat]` order,
/// preserving sequence order.
pub fn transform(points: &[LatLon]) -> Vec<LonLat> {
    points.iter().copied().map(LonLat::from).collect()
}
