//! Raster collaborators for the encoding pipeline
//!
//! The pipeline only talks to [`ElevationSource`] and [`RgbSink`]. Native
//! GeoTIFF implementations live next to in-memory ones used by tests and
//! embedders.

mod chunk_cache;
mod geotiff_reader;
mod geotiff_writer;
mod memory;
pub mod tags;

use ndarray::ArrayView2;

use crate::error::Result;
use crate::profile::{OutputProfile, SourceProfile};
use crate::raster::{Band, ElevationTile, EncodedTile, Window};

pub use geotiff_reader::{GeoTiffSource, ReaderOptions};
pub use geotiff_writer::GeoTiffSink;
pub use memory::{EncodedRaster, MemorySink, MemorySource};

/// Read access to a single-band elevation raster.
///
/// Implementations must tolerate concurrent `read_window` calls on
/// disjoint windows.
pub trait ElevationSource: Send + Sync {
    fn profile(&self) -> &SourceProfile;

    /// Read the samples of `window`; the tile carries the source nodata.
    fn read_window(&self, window: &Window) -> Result<ElevationTile>;
}

/// Write access to a 3-band, 8-bit Terrain-RGB raster.
pub trait RgbSink {
    /// Handle returned once every window has been written
    type Output;

    fn profile(&self) -> &OutputProfile;

    /// Write one band's samples at `window`'s offset.
    fn write_band(&mut self, band: Band, window: &Window, samples: ArrayView2<'_, u8>)
        -> Result<()>;

    /// Write all three channels of an encoded tile.
    fn write_tile(&mut self, tile: &EncodedTile) -> Result<()> {
        for band in Band::ALL {
            self.write_band(band, tile.window(), tile.band(band))?;
        }
        Ok(())
    }

    /// Complete the raster. Fails if any window was never written.
    fn finish(self) -> Result<Self::Output>
    where
        Self: Sized;
}
