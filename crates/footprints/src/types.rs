use crate::errors::{FootprintError, Result};
use serde::{Deserialize, Serialize};

/// Geographic extent in WGS84 degrees, as drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Rejects non-finite ordinates, out-of-range values and inverted extents.
    pub fn validate(&self) -> Result<()> {
        let ordinates = [self.west, self.south, self.east, self.north];
        if ordinates.iter().any(|v| !v.is_finite()) {
            return Err(FootprintError::Validation(
                "bounding box ordinates must be finite numbers".to_string(),
            ));
        }
        check_lon(self.west)?;
        check_lon(self.east)?;
        check_lat(self.south)?;
        check_lat(self.north)?;
        if self.west >= self.east {
            return Err(FootprintError::Validation(format!(
                "west ({}) must be less than east ({})",
                self.west, self.east
            )));
        }
        if self.south >= self.north {
            return Err(FootprintError::Validation(format!(
                "south ({}) must be less than north ({})",
                self.south, self.north
            )));
        }
        Ok(())
    }

    /// `west,south,east,north`, the form the tiling collaborator expects.
    pub fn to_arg(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// Annotation point as clicked on the map: `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LatLon(pub f64, pub f64);

/// Annotation point in detector order: `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LonLat(pub f64, pub f64);

impl LatLon {
    pub fn validate(&self) -> Result<()> {
        if !self.0.is_finite() || !self.1.is_finite() {
            return Err(FootprintError::Validation(format!(
                "point [{}, {}] must contain finite numbers",
                self.0, self.1
            )));
        }
        check_lat(self.0)?;
        check_lon(self.1)
    }
}

impl From<LatLon> for LonLat {
    fn from(p: LatLon) -> Self {
        LonLat(p.1, p.0)
    }
}

impl From<LonLat> for LatLon {
    fn from(p: LonLat) -> Self {
        LatLon(p.1, p.0)
    }
}

fn check_lat(lat: f64) -> Result<()> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        Err(FootprintError::Validation(format!(
            "latitude {lat} is outside [-90, 90]"
        )))
    }
}

fn check_lon(lon: f64) -> Result<()> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(FootprintError::Validation(format!(
            "longitude {lon} is outside [-180, 180]"
        )))
    }
}
