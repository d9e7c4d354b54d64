//! In-memory source and sink

use ndarray::{s, Array2, ArrayView2};

use crate::encoding::decode;
use crate::error::{Error, Result};
use crate::io::{ElevationSource, RgbSink};
use crate::profile::{OutputProfile, SourceProfile};
use crate::raster::{block_windows, Band, ElevationTile, Window};

/// Elevation raster held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    profile: SourceProfile,
    data: Array2<f64>,
}

impl MemorySource {
    /// `data` is `(rows, cols)` and must match the profile dimensions.
    pub fn new(data: Array2<f64>, profile: SourceProfile) -> Result<Self> {
        let (rows, cols) = data.dim();
        if (rows, cols) != (profile.height, profile.width) {
            return Err(Error::SizeMismatch {
                er: profile.height,
                ec: profile.width,
                ar: rows,
                ac: cols,
            });
        }
        Ok(Self { profile, data })
    }

    /// Source with default georeferencing and the given nodata
    pub fn from_array(data: Array2<f64>, nodata: Option<f64>) -> Self {
        let (rows, cols) = data.dim();
        Self {
            profile: SourceProfile::new(cols, rows).with_nodata(nodata),
            data,
        }
    }
}

impl ElevationSource for MemorySource {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    fn read_window(&self, window: &Window) -> Result<ElevationTile> {
        window.check_within(self.profile.width, self.profile.height)?;
        let samples = self
            .data
            .slice(s![window.y..window.bottom(), window.x..window.right()])
            .to_owned();
        ElevationTile::new(*window, samples, self.profile.nodata)
    }
}

/// Terrain-RGB raster assembled in memory.
#[derive(Debug, Clone)]
pub struct MemorySink {
    profile: OutputProfile,
    bands: [Array2<u8>; 3],
    /// Bit per band, set once that band's pixel is written
    written: Array2<u8>,
}

const ALL_BANDS: u8 = 0b111;

impl MemorySink {
    pub fn new(profile: &OutputProfile) -> Self {
        let shape = (profile.height(), profile.width());
        Self {
            profile: profile.clone(),
            bands: [
                Array2::zeros(shape),
                Array2::zeros(shape),
                Array2::zeros(shape),
            ],
            written: Array2::zeros(shape),
        }
    }
}

impl RgbSink for MemorySink {
    type Output = EncodedRaster;

    fn profile(&self) -> &OutputProfile {
        &self.profile
    }

    fn write_band(
        &mut self,
        band: Band,
        window: &Window,
        samples: ArrayView2<'_, u8>,
    ) -> Result<()> {
        window.check_within(self.profile.width(), self.profile.height())?;
        let (er, ec) = window.shape();
        let (ar, ac) = samples.dim();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let bit = 1u8 << band.offset();
        let mut mask = self
            .written
            .slice_mut(s![window.y..window.bottom(), window.x..window.right()]);
        if mask.iter().any(|&m| m & bit != 0) {
            return Err(Error::WindowOverlap {
                window: *window,
                band: band.number(),
            });
        }
        mask.mapv_inplace(|m| m | bit);

        self.bands[band.offset()]
            .slice_mut(s![window.y..window.bottom(), window.x..window.right()])
            .assign(&samples);
        Ok(())
    }

    fn finish(self) -> Result<EncodedRaster> {
        let missing = block_windows(
            self.profile.width(),
            self.profile.height(),
            self.profile.block_size(),
        )
        .filter(|w| {
            self.written
                .slice(s![w.y..w.bottom(), w.x..w.right()])
                .iter()
                .any(|&m| m != ALL_BANDS)
        })
        .count();

        if missing > 0 {
            return Err(Error::IncompleteOutput { missing });
        }

        let [red, green, blue] = self.bands;
        Ok(EncodedRaster {
            profile: self.profile,
            red,
            green,
            blue,
        })
    }
}

/// Completed in-memory Terrain-RGB raster
#[derive(Debug, Clone)]
pub struct EncodedRaster {
    pub profile: OutputProfile,
    pub red: Array2<u8>,
    pub green: Array2<u8>,
    pub blue: Array2<u8>,
}

impl EncodedRaster {
    /// `[R, G, B]` at `(row, col)`
    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        Some([
            *self.red.get((row, col))?,
            *self.green.get((row, col))?,
            *self.blue.get((row, col))?,
        ])
    }

    /// Decode every pixel back to elevation
    pub fn decode(&self) -> Array2<f64> {
        ndarray::Zip::from(&self.red)
            .and(&self.green)
            .and(&self.blue)
            .map_collect(|&r, &g, &b| decode([r, g, b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileOptions;
    use crate::raster::BlockSize;
    use ndarray::array;

    fn small_profile() -> OutputProfile {
        let options = ProfileOptions {
            block_size: BlockSize::square(2).unwrap(),
            ..Default::default()
        };
        OutputProfile::derive(&SourceProfile::new(3, 3), &options)
    }

    #[test]
    fn test_source_reads_window() {
        let source = MemorySource::from_array(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
            Some(-1.0),
        );
        let tile = source.read_window(&Window::new(1, 1, 2, 2)).unwrap();
        assert_eq!(tile.data(), &array![[5.0, 6.0], [8.0, 9.0]]);
        assert_eq!(tile.nodata(), Some(-1.0));

        assert!(source.read_window(&Window::new(2, 2, 2, 2)).is_err());
    }

    #[test]
    fn test_source_dimension_check() {
        let profile = SourceProfile::new(4, 3);
        assert!(MemorySource::new(Array2::zeros((3, 4)), profile.clone()).is_ok());
        assert!(MemorySource::new(Array2::zeros((4, 3)), profile).is_err());
    }

    #[test]
    fn test_sink_rejects_overlap() {
        let mut sink = MemorySink::new(&small_profile());
        let window = Window::new(0, 0, 2, 2);
        let samples = Array2::from_elem((2, 2), 7u8);

        sink.write_band(Band::Red, &window, samples.view()).unwrap();
        sink.write_band(Band::Green, &window, samples.view()).unwrap();
        assert!(matches!(
            sink.write_band(Band::Red, &window, samples.view()),
            Err(Error::WindowOverlap { band: 1, .. })
        ));
    }

    #[test]
    fn test_sink_rejects_gaps() {
        let mut sink = MemorySink::new(&small_profile());
        let samples = Array2::from_elem((2, 2), 1u8);
        for band in Band::ALL {
            sink.write_band(band, &Window::new(0, 0, 2, 2), samples.view())
                .unwrap();
        }
        assert!(matches!(
            sink.finish(),
            Err(Error::IncompleteOutput { missing: 3 })
        ));
    }

    #[test]
    fn test_sink_rejects_shape_mismatch() {
        let mut sink = MemorySink::new(&small_profile());
        let samples = Array2::from_elem((1, 2), 1u8);
        assert!(matches!(
            sink.write_band(Band::Blue, &Window::new(0, 0, 2, 2), samples.view()),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
