//! Selection of the local metric frame used to buffer a hazard.

use popexp_core::error::{ExposureError, Result, UNKNOWN_FEATURE};
use popexp_core::models::Crs;

/// EPSG base codes of the WGS 84 / UTM families
const UTM_NORTH_BASE: u32 = 32600;
const UTM_SOUTH_BASE: u32 = 32700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    North,
    South,
}

/// A WGS 84 / UTM zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalProjection {
    /// Zone number, 1..=60
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

impl LocalProjection {
    pub fn epsg_code(&self) -> u32 {
        let base = match self.hemisphere {
            Hemisphere::North => UTM_NORTH_BASE,
            Hemisphere::South => UTM_SOUTH_BASE,
        };
        base + u32::from(self.zone)
    }

    pub fn crs(&self) -> Crs {
        Crs::epsg(self.epsg_code())
    }
}

/// UTM zone containing `lon`. The antimeridian (180) wraps to zone 1.
pub fn utm_zone(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() as i64 % 60 + 1;
    zone.clamp(1, 60) as u8
}

/// Pick the UTM zone for a representative point given in decimal degrees.
///
/// Latitudes outside [-90, 90], longitudes outside [-180, 180] and non-finite
/// values are rejected with [`ExposureError::InvalidCoordinate`].
pub fn select_projection(lat: f64, lon: f64) -> Result<LocalProjection> {
    if !lat.is_finite() || !lon.is_finite() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ExposureError::InvalidCoordinate { feature_id: UNKNOWN_FEATURE.to_string(), lat, lon });
    }

    let hemisphere = if lat >= 0.0 { Hemisphere::North } else { Hemisphere::South };
    Ok(LocalProjection { zone: utm_zone(lon), hemisphere })
}
