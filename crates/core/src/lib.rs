//! # terrargb core
//!
//! Types, codec and raster I/O for converting digital elevation models into
//! Terrain-RGB rasters.
//!
//! This crate provides:
//! - `Window`, `BlockSize`, `block_windows`: block grid over a raster extent
//! - `encoding`: the Terrain-RGB codec and nodata sanitizing
//! - `OutputProfile`: the fixed layout of the 3-band output
//! - `ElevationSource` / `RgbSink`: the I/O seams, with native GeoTIFF and
//!   in-memory implementations

pub mod crs;
pub mod encoding;
pub mod error;
pub mod io;
pub mod profile;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use io::{ElevationSource, RgbSink};
pub use profile::{Compression, OutputProfile, ProfileOptions, SampleType, SourceProfile};
pub use raster::{
    block_windows, Band, BlockSize, ElevationTile, EncodedTile, GeoTransform, Window,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::encoding::{encode_tile, sanitize};
    pub use crate::error::{Error, Result};
    pub use crate::io::{ElevationSource, GeoTiffSink, GeoTiffSource, RgbSink};
    pub use crate::profile::{Compression, OutputProfile, ProfileOptions, SourceProfile};
    pub use crate::raster::{block_windows, Band, BlockSize, GeoTransform, Window};
}
