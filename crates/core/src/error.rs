//! Error types for terrargb

use thiserror::Error;

use crate::raster::Window;

/// Main error type for terrargb operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Tile size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{window} lies outside the {width}x{height} raster extent")]
    WindowOutOfBounds {
        window: Window,
        width: usize,
        height: usize,
    },

    #[error("{window} is not aligned to the {block_width}x{block_height} block grid")]
    WindowMisaligned {
        window: Window,
        block_width: usize,
        block_height: usize,
    },

    #[error("source returned {actual} when {expected} was requested")]
    WindowMismatch { expected: Window, actual: Window },

    #[error("band {band} of {window} was already written")]
    WindowOverlap { window: Window, band: usize },

    #[error("output incomplete: {missing} block(s) never written")]
    IncompleteOutput { missing: usize },

    #[error("failed at {window}: {source}")]
    Window {
        window: Window,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Attach window coordinates to an error raised while processing it.
    pub fn at_window(self, window: Window) -> Self {
        match self {
            // Already carries coordinates
            Error::Window { .. } => self,
            other => Error::Window {
                window,
                source: Box::new(other),
            },
        }
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for terrargb operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_context_wraps_once() {
        let window = Window::new(256, 512, 256, 100);
        let err = Error::Other("boom".into()).at_window(window).at_window(window);

        match &err {
            Error::Window { window: w, source } => {
                assert_eq!(*w, window);
                assert!(matches!(**source, Error::Other(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("x=256"));
    }
}
