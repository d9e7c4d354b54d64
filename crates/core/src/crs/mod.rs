//! Coordinate Reference System carried through the pipeline
//!
//! The CRS is never interpreted or validated here. It is read from the
//! source GeoTIFF's GeoKey directory and written back out unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GeoKey IDs
pub mod keys {
    pub const GT_MODEL_TYPE: u16 = 1024;
    pub const GT_RASTER_TYPE: u16 = 1025;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;

    pub const MODEL_TYPE_PROJECTED: u16 = 1;
    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
}

/// Raw GeoTIFF key directory with its parameter tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoKeyDirectory {
    /// `GeoKeyDirectoryTag` (34735) contents, header included
    pub directory: Vec<u16>,
    /// `GeoDoubleParamsTag` (34736)
    pub doubles: Vec<f64>,
    /// `GeoAsciiParamsTag` (34737)
    pub ascii: Option<String>,
}

impl GeoKeyDirectory {
    /// Value of a key stored inline (TIFFTagLocation = 0)
    pub fn short_value(&self, key: u16) -> Option<u16> {
        self.directory
            .get(4..)?
            .chunks_exact(4)
            .find(|entry| entry[0] == key && entry[1] == 0)
            .map(|entry| entry[3])
    }

    /// Minimal directory declaring pixel-is-area and the given EPSG code
    fn for_epsg(code: u16, geographic: bool) -> Self {
        let (model, cs_key) = if geographic {
            (keys::MODEL_TYPE_GEOGRAPHIC, keys::GEOGRAPHIC_TYPE)
        } else {
            (keys::MODEL_TYPE_PROJECTED, keys::PROJECTED_CS_TYPE)
        };
        #[rustfmt::skip]
        let directory = vec![
            1, 1, 0, 3, // version 1.1.0, 3 keys
            keys::GT_MODEL_TYPE, 0, 1, model,
            keys::GT_RASTER_TYPE, 0, 1, keys::RASTER_PIXEL_IS_AREA,
            cs_key, 0, 1, code,
        ];
        Self {
            directory,
            doubles: Vec::new(),
            ascii: None,
        }
    }
}

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    geo_keys: Option<GeoKeyDirectory>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            geo_keys: None,
        }
    }

    /// Wrap a key directory read from a GeoTIFF, picking up its EPSG code
    /// when one is stored inline.
    pub fn from_geo_keys(geo_keys: GeoKeyDirectory) -> Self {
        let epsg = geo_keys
            .short_value(keys::PROJECTED_CS_TYPE)
            .or_else(|| geo_keys.short_value(keys::GEOGRAPHIC_TYPE))
            // 32767 is "user-defined"
            .filter(|&code| code != 32767)
            .map(u32::from);
        Self {
            epsg,
            geo_keys: Some(geo_keys),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn geo_keys(&self) -> Option<&GeoKeyDirectory> {
        self.geo_keys.as_ref()
    }

    /// Key directory to write: the original one verbatim, or a minimal one
    /// synthesized from the EPSG code.
    pub fn to_geo_keys(&self) -> Option<GeoKeyDirectory> {
        if let Some(keys) = &self.geo_keys {
            return Some(keys.clone());
        }
        let code = u16::try_from(self.epsg?).ok()?;
        Some(GeoKeyDirectory::for_epsg(code, is_geographic_epsg(code)))
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(ascii) = self.geo_keys.as_ref().and_then(|k| k.ascii.as_deref()) {
            let citation = ascii.trim_end_matches('|');
            return citation.chars().take(50).collect();
        }
        "Unknown".to_string()
    }
}

/// EPSG geographic 2D codes live in 4000..5000
fn is_geographic_epsg(code: u16) -> bool {
    (4000..5000).contains(&code)
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
