//! Raster geometry and per-window sample buffers

mod geotransform;
mod tile;
pub mod window;

pub use geotransform::GeoTransform;
pub use tile::{Band, ElevationTile, EncodedTile};
pub use window::{block_windows, BlockSize, BlockWindows, Window, DEFAULT_BLOCK_SIZE};
