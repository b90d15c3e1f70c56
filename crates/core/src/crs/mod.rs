//! Coordinate Reference System handling

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation.
///
/// Chips and labels carry their CRS so that grids produced independently
/// can be checked for compatibility. EPSG codes are the primary identity;
/// WKT is kept when a reader supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation if available
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// Parse a CRS code string such as `"epsg:4326"` or `"EPSG:32630"`
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(num) = lower.strip_prefix("epsg:") {
            let epsg: u32 = num
                .parse()
                .map_err(|_| Error::Other(format!("Invalid EPSG code: {trimmed}")))?;
            return Ok(Self::from_epsg(epsg));
        }
        Err(Error::Other(format!("Cannot parse CRS string: {trimmed}")))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether this is the WGS84 geographic CRS
    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// If this is a UTM CRS, return `(zone, is_north)`.
    ///
    /// - EPSG 326xx maps to zone xx, northern hemisphere
    /// - EPSG 327xx maps to zone xx, southern hemisphere
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg {
            Some(code) if (32601..=32660).contains(&code) => Some((code - 32600, true)),
            Some(code) if (32701..=32760).contains(&code) => Some((code - 32700, false)),
            _ => None,
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg() {
        let crs = CRS::parse("epsg:4326").unwrap();
        assert_eq!(crs.epsg(), Some(4326));
        assert!(crs.is_geographic());
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(CRS::parse("utm30n").is_err());
        assert!(CRS::parse("epsg:abc").is_err());
    }

    #[test]
    fn test_utm_zone() {
        assert_eq!(CRS::from_epsg(32630).utm_zone(), Some((30, true)));
        assert_eq!(CRS::from_epsg(32721).utm_zone(), Some((21, false)));
        assert_eq!(CRS::wgs84().utm_zone(), None);
        assert_eq!(CRS::from_epsg(32600).utm_zone(), None);
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::parse("EPSG:4326").unwrap();
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(32630)));
    }
}
