//! Elevation encoding
//!
//! - [`nodata`]: void replacement ahead of encoding
//! - [`terrain_rgb`]: the Terrain-RGB quantization codec

pub mod nodata;
pub mod terrain_rgb;

pub use nodata::{sanitize, VOID_FILL};
pub use terrain_rgb::{decode, decode_tile, encode, encode_tile, MAX_ELEVATION, MIN_ELEVATION};
