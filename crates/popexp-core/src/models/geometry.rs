//! Coordinate reference systems and validity policy shared by all popexp crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExposureError;

/// Authority that issued a CRS code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsAuthority {
    Epsg,
    Esri,
}

impl CrsAuthority {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrsAuthority::Epsg => "EPSG",
            CrsAuthority::Esri => "ESRI",
        }
    }
}

/// Coordinate Reference System identified by an authority code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crs {
    pub authority: CrsAuthority,
    pub code: u32,
    pub name: String,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.authority == other.authority && self.code == other.code
    }
}

impl Eq for Crs {}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(authority: CrsAuthority, code: u32, name: impl Into<String>) -> Self {
        Self { authority, code, name: name.into() }
    }

    pub fn epsg(code: u32) -> Self {
        let name = match code {
            4326 => "WGS 84".to_string(),
            3857 => "Web Mercator".to_string(),
            32601..=32660 => format!("WGS 84 / UTM zone {}N", code - 32600),
            32701..=32760 => format!("WGS 84 / UTM zone {}S", code - 32700),
            _ => format!("EPSG:{}", code),
        };
        Self::new(CrsAuthority::Epsg, code, name)
    }

    /// WGS 84 (EPSG:4326), the canonical geographic frame
    pub fn wgs84() -> Self {
        Self::epsg(4326)
    }

    /// World Mollweide (ESRI:54009), the usual frame of global population grids
    pub fn mollweide() -> Self {
        Self::new(CrsAuthority::Esri, 54009, "World Mollweide")
    }

    pub fn is_wgs84(&self) -> bool {
        self.authority == CrsAuthority::Epsg && self.code == 4326
    }

    /// Authority-qualified identifier understood by PROJ, e.g. `EPSG:32633`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.authority.as_str(), self.code)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority.as_str(), self.code)
    }
}

impl FromStr for Crs {
    type Err = ExposureError;

    /// Parse `EPSG:4326`, `ESRI:54009`, `urn:ogc:def:crs:EPSG::4326` or `OGC:CRS84`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();

        // CRS84 is WGS 84 with lon/lat axis order, which is how coordinates are handled anyway
        if upper.ends_with("CRS84") {
            return Ok(Crs::wgs84());
        }

        let invalid = || ExposureError::ConfigInvalid {
            key: "crs".to_string(),
            reason: format!("Unrecognised CRS '{}'. Use AUTHORITY:CODE, e.g. EPSG:4326", trimmed),
        };

        let mut parts = upper.split(':').filter(|p| !p.is_empty()).collect::<Vec<_>>();
        let code = parts.pop().ok_or_else(invalid)?.parse::<u32>().map_err(|_| invalid())?;

        let authority = if parts.contains(&"ESRI") {
            CrsAuthority::Esri
        } else if parts.contains(&"EPSG") || parts.is_empty() {
            CrsAuthority::Epsg
        } else {
            return Err(invalid());
        };

        Ok(match authority {
            CrsAuthority::Epsg => Crs::epsg(code),
            CrsAuthority::Esri if code == 54009 => Crs::mollweide(),
            CrsAuthority::Esri => Crs::new(CrsAuthority::Esri, code, format!("ESRI:{}", code)),
        })
    }
}

/// Policy for features that fail coordinate, buffer or repair checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValidityMode {
    /// Abort the whole run on the first invalid feature
    #[default]
    Strict,
    /// Log the invalid feature and continue without it
    Lenient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg() {
        let crs: Crs = "EPSG:32633".parse().unwrap();
        assert_eq!(crs.authority, CrsAuthority::Epsg);
        assert_eq!(crs.code, 32633);
        assert_eq!(crs.name, "WGS 84 / UTM zone 33N");
    }

    #[test]
    fn test_parse_urn_and_crs84() {
        let urn: Crs = "urn:ogc:def:crs:EPSG::4326".parse().unwrap();
        assert!(urn.is_wgs84());

        let crs84: Crs = "urn:ogc:def:crs:OGC:1.3:CRS84".parse().unwrap();
        assert!(crs84.is_wgs84());
    }

    #[test]
    fn test_parse_esri() {
        let crs: Crs = "esri:54009".parse().unwrap();
        assert_eq!(crs, Crs::mollweide());
        assert_eq!(crs.to_string(), "ESRI:54009");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-crs".parse::<Crs>().is_err());
        assert!("FOO:12".parse::<Crs>().is_err());
    }

    #[test]
    fn test_equality_ignores_name() {
        let a = Crs::new(CrsAuthority::Epsg, 4326, "something else");
        assert_eq!(a, Crs::wgs84());
    }
}
