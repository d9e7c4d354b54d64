//! Source and output raster profiles
//!
//! [`OutputProfile::derive`] is the only way to build an output profile. It
//! copies georeferencing from the source and fixes everything else to the
//! Terrain-RGB layout. The output never declares a nodata value: every RGB
//! triple decodes to a legitimate elevation, so no value could mean "void"
//! without colliding with real data.

use std::fmt;

use num_traits::{cast, NumCast};
use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BlockSize, GeoTransform};

/// Sample storage type of a raster band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    UInt8,
    UInt16,
    UInt32,
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl SampleType {
    pub fn bits(self) -> u16 {
        match self {
            SampleType::UInt8 | SampleType::Int8 => 8,
            SampleType::UInt16 | SampleType::Int16 => 16,
            SampleType::UInt32 | SampleType::Int32 | SampleType::Float32 => 32,
            SampleType::Float64 => 64,
        }
    }

    /// TIFF `SampleFormat` code: 1 unsigned, 2 signed, 3 IEEE float
    pub fn tiff_sample_format(self) -> u16 {
        match self {
            SampleType::UInt8 | SampleType::UInt16 | SampleType::UInt32 => 1,
            SampleType::Int8 | SampleType::Int16 | SampleType::Int32 => 2,
            SampleType::Float32 | SampleType::Float64 => 3,
        }
    }

    /// `value` as a sample of this type would hold it.
    ///
    /// Floats are rounded to the storage precision, so a sentinel parsed from
    /// text compares equal to the samples that carry it. Integer types yield
    /// `None` for values no sample can hold (fractional, out of range, NaN).
    pub fn stored_value(self, value: f64) -> Option<f64> {
        fn integral<T: NumCast + Into<f64>>(value: f64) -> Option<f64> {
            cast::<f64, T>(value)
                .map(Into::into)
                .filter(|&stored| stored == value)
        }

        match self {
            SampleType::UInt8 => integral::<u8>(value),
            SampleType::UInt16 => integral::<u16>(value),
            SampleType::UInt32 => integral::<u32>(value),
            SampleType::Int8 => integral::<i8>(value),
            SampleType::Int16 => integral::<i16>(value),
            SampleType::Int32 => integral::<i32>(value),
            SampleType::Float32 => Some(<f64 as From<f32>>::from(value as f32)),
            SampleType::Float64 => Some(value),
        }
    }

    /// Resolve from TIFF bits-per-sample and sample format
    pub fn from_tiff(bits: u16, sample_format: u16) -> Result<Self> {
        let st = match (bits, sample_format) {
            (8, 1) => SampleType::UInt8,
            (16, 1) => SampleType::UInt16,
            (32, 1) => SampleType::UInt32,
            (8, 2) => SampleType::Int8,
            (16, 2) => SampleType::Int16,
            (32, 2) => SampleType::Int32,
            (32, 3) => SampleType::Float32,
            (64, 3) => SampleType::Float64,
            _ => {
                return Err(Error::UnsupportedDataType(format!(
                    "bits_per_sample={}, sample_format={}",
                    bits, sample_format
                )))
            }
        };
        Ok(st)
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::UInt8 => "uint8",
            SampleType::UInt16 => "uint16",
            SampleType::UInt32 => "uint32",
            SampleType::Int8 => "int8",
            SampleType::Int16 => "int16",
            SampleType::Int32 => "int32",
            SampleType::Float32 => "float32",
            SampleType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Output compression codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    Lzw,
    Deflate,
}

impl Compression {
    /// TIFF `Compression` tag value
    pub fn tiff_code(self) -> u16 {
        match self {
            Compression::Lzw => 5,
            Compression::Deflate => 8,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::Lzw => f.write_str("lzw"),
            Compression::Deflate => f.write_str("deflate"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lzw" => Ok(Compression::Lzw),
            "deflate" | "zlib" => Ok(Compression::Deflate),
            _ => Err(Error::InvalidParameter {
                name: "compression",
                value: s.to_string(),
                reason: "expected lzw or deflate".into(),
            }),
        }
    }
}

/// What the pipeline needs to know about the input DEM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    /// Void sentinel declared by the source
    pub nodata: Option<f64>,
    pub sample_type: SampleType,
}

impl SourceProfile {
    /// Single-band float profile with default georeferencing
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
            sample_type: SampleType::Float64,
        }
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }
}

/// Caller-controlled parts of the output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOptions {
    pub block_size: BlockSize,
    pub compression: Compression,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            block_size: BlockSize::default(),
            compression: Compression::Lzw,
        }
    }
}

/// Immutable layout of the Terrain-RGB output raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputProfile {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    band_count: u16,
    sample_type: SampleType,
    tiled: bool,
    block_size: BlockSize,
    compression: Compression,
    nodata: Option<f64>,
}

impl OutputProfile {
    /// Number of bands in a Terrain-RGB raster
    pub const BAND_COUNT: u16 = 3;

    /// Derive the output profile from the source.
    ///
    /// The source nodata value is deliberately dropped.
    pub fn derive(source: &SourceProfile, options: &ProfileOptions) -> Self {
        Self {
            width: source.width,
            height: source.height,
            transform: source.transform,
            crs: source.crs.clone(),
            band_count: Self::BAND_COUNT,
            sample_type: SampleType::UInt8,
            tiled: true,
            block_size: options.block_size,
            compression: options.compression,
            nodata: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn band_count(&self) -> u16 {
        self.band_count
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn tiled(&self) -> bool {
        self.tiled
    }

    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Always `None`
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }
}
