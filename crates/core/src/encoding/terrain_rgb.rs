//! Terrain-RGB elevation codec
//!
//! Elevations are quantized to 0.1 m steps above a -10000 m floor and the
//! resulting 24-bit integer is split across three 8-bit channels:
//!
//! ```text
//! val = clamp(round((e + 10000) * 10), 0, 2^24 - 1)
//! R = val >> 16, G = (val >> 8) & 0xFF, B = val & 0xFF
//! e = -10000 + (R * 65536 + G * 256 + B) * 0.1
//! ```
//!
//! Out-of-range elevations saturate at the nearest representable bound;
//! they never wrap into neighbouring channels.

use ndarray::{Array2, Zip};

use crate::error::Result;
use crate::raster::{ElevationTile, EncodedTile};

/// Elevation mapped to code 0
pub const BASE_ELEVATION: f64 = -10_000.0;

/// Quantization step in metres
pub const STEP: f64 = 0.1;

const CODES_PER_METRE: f64 = 10.0;

/// Largest 24-bit code
pub const MAX_CODE: u32 = 0x00FF_FFFF;

/// Lowest representable elevation
pub const MIN_ELEVATION: f64 = BASE_ELEVATION;

/// Highest representable elevation (code 16_777_215)
pub const MAX_ELEVATION: f64 = 1_667_721.5;

/// Quantize an elevation to its saturated 24-bit code. NaN maps to 0.
pub fn quantize(elevation: f64) -> u32 {
    let scaled = ((elevation - BASE_ELEVATION) * CODES_PER_METRE).round();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= MAX_CODE as f64 {
        MAX_CODE
    } else {
        scaled as u32
    }
}

/// Elevation represented by a 24-bit code
pub fn dequantize(code: u32) -> f64 {
    BASE_ELEVATION + f64::from(code.min(MAX_CODE)) / CODES_PER_METRE
}

/// Encode one elevation as `[R, G, B]`
pub fn encode(elevation: f64) -> [u8; 3] {
    let code = quantize(elevation);
    [(code >> 16) as u8, (code >> 8) as u8, code as u8]
}

/// Decode `[R, G, B]` back to an elevation
pub fn decode(rgb: [u8; 3]) -> f64 {
    let [r, g, b] = rgb;
    let code = u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b);
    dequantize(code)
}

/// Encode every sample of a tile into three channel arrays.
pub fn encode_tile(tile: &ElevationTile) -> Result<EncodedTile> {
    let shape = tile.shape();
    let mut red = Array2::<u8>::zeros(shape);
    let mut green = Array2::<u8>::zeros(shape);
    let mut blue = Array2::<u8>::zeros(shape);

    Zip::from(&mut red)
        .and(&mut green)
        .and(&mut blue)
        .and(tile.data())
        .for_each(|r, g, b, &e| {
            [*r, *g, *b] = encode(e);
        });

    EncodedTile::new(*tile.window(), red, green, blue)
}

/// Decode an encoded tile back to elevations.
pub fn decode_tile(tile: &EncodedTile) -> Array2<f64> {
    Zip::from(tile.red())
        .and(tile.green())
        .and(tile.blue())
        .map_collect(|&r, &g, &b| decode([r, g, b]))
}
