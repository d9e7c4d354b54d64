//! Per-window sample buffers

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::raster::Window;

/// Elevation samples read from one window of a DEM.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationTile {
    window: Window,
    data: Array2<f64>,
    nodata: Option<f64>,
}

impl ElevationTile {
    /// Wrap samples for `window`; the array shape must be `(height, width)`.
    pub fn new(window: Window, data: Array2<f64>, nodata: Option<f64>) -> Result<Self> {
        check_shape(&window, data.dim())?;
        Ok(Self {
            window,
            data,
            nodata,
        })
    }

    /// Build a tile from row-major samples
    pub fn from_vec(window: Window, data: Vec<f64>, nodata: Option<f64>) -> Result<Self> {
        if data.len() != window.area() {
            return Err(Error::InvalidDimensions {
                width: window.width,
                height: window.height,
            });
        }
        let array = Array2::from_shape_vec(window.shape(), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Self::new(window, array, nodata)
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Sentinel inherited from the source raster
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// New tile over the same window with every sample passed through `f`
    pub fn map_samples(&self, nodata: Option<f64>, f: impl Fn(f64) -> f64) -> ElevationTile {
        ElevationTile {
            window: self.window,
            data: self.data.mapv(f),
            nodata,
        }
    }
}

/// Red, green and blue channels of one encoded window.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTile {
    window: Window,
    red: Array2<u8>,
    green: Array2<u8>,
    blue: Array2<u8>,
}

/// Output band of a Terrain-RGB raster, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Red = 1,
    Green = 2,
    Blue = 3,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Red, Band::Green, Band::Blue];

    /// 1-based band number
    pub fn number(self) -> usize {
        self as usize
    }

    /// 0-based sample index within an interleaved pixel
    pub fn offset(self) -> usize {
        self as usize - 1
    }
}

impl EncodedTile {
    pub fn new(
        window: Window,
        red: Array2<u8>,
        green: Array2<u8>,
        blue: Array2<u8>,
    ) -> Result<Self> {
        for channel in [&red, &green, &blue] {
            check_shape(&window, channel.dim())?;
        }
        Ok(Self {
            window,
            red,
            green,
            blue,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn band(&self, band: Band) -> ArrayView2<'_, u8> {
        match band {
            Band::Red => self.red.view(),
            Band::Green => self.green.view(),
            Band::Blue => self.blue.view(),
        }
    }

    pub fn red(&self) -> &Array2<u8> {
        &self.red
    }

    pub fn green(&self) -> &Array2<u8> {
        &self.green
    }

    pub fn blue(&self) -> &Array2<u8> {
        &self.blue
    }

    pub fn shape(&self) -> (usize, usize) {
        self.red.dim()
    }
}

fn check_shape(window: &Window, (rows, cols): (usize, usize)) -> Result<()> {
    let (er, ec) = window.shape();
    if (rows, cols) != (er, ec) {
        return Err(Error::SizeMismatch {
            er,
            ec,
            ar: rows,
            ac: cols,
        });
    }
    Ok(())
}
