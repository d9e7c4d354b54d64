//! TIFF and GeoTIFF tag IDs and field types used by the native reader and writer.

pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC: u16 = 262;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const PLANAR_CONFIG: u16 = 284;
pub const TILE_WIDTH: u16 = 322;
pub const TILE_LENGTH: u16 = 323;
pub const TILE_OFFSETS: u16 = 324;
pub const TILE_BYTE_COUNTS: u16 = 325;
pub const SAMPLE_FORMAT: u16 = 339;
pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const MODEL_TRANSFORMATION: u16 = 34264;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GEO_DOUBLE_PARAMS: u16 = 34736;
pub const GEO_ASCII_PARAMS: u16 = 34737;
/// GDAL's nodata tag. Never written for Terrain-RGB output.
pub const GDAL_NODATA: u16 = 42113;

/// PhotometricInterpretation = RGB
pub const PHOTOMETRIC_RGB: u16 = 2;
/// PlanarConfiguration = chunky (RGBRGB...)
pub const PLANAR_CHUNKY: u16 = 1;

/// TIFF field types
pub mod field_type {
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const DOUBLE: u16 = 12;
}

/// Tag as understood by the `tiff` crate decoder
pub fn decoder_tag(id: u16) -> tiff::tags::Tag {
    tiff::tags::Tag::from_u16_exhaustive(id)
}
