//! Block-aligned window enumeration over a raster extent

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default block edge used for both processing windows and output tiles.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// A rectangular region of a raster in pixel coordinates.
///
/// `x` is the column offset and `y` the row offset of the upper-left pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Column offset in the source raster
    pub x: usize,
    /// Row offset in the source raster
    pub y: usize,
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
}

impl Window {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shape as ndarray `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Exclusive right column
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom row
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Number of pixels covered
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether the window lies entirely inside `[0, width) x [0, height)`.
    pub fn is_within(&self, width: usize, height: usize) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    /// Fail with [`Error::WindowOutOfBounds`] unless the window fits the extent.
    pub fn check_within(&self, width: usize, height: usize) -> Result<()> {
        if self.is_within(width, height) {
            Ok(())
        } else {
            Err(Error::WindowOutOfBounds {
                window: *self,
                width,
                height,
            })
        }
    }

    /// Whether two windows share at least one pixel
    pub fn intersects(&self, other: &Window) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Overlapping region of two windows, if any
    pub fn intersection(&self, other: &Window) -> Option<Window> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Window::new(
            x,
            y,
            self.right().min(other.right()) - x,
            self.bottom().min(other.bottom()) - y,
        ))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "window(x={}, y={}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Nominal block dimensions. Both edges are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockSize {
    width: usize,
    height: usize,
}

impl BlockSize {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidParameter {
                name: "block_size",
                value: format!("{}x{}", width, height),
                reason: "block edges must be non-zero".into(),
            });
        }
        Ok(Self { width, height })
    }

    /// Square block with the given edge
    pub fn square(edge: usize) -> Result<Self> {
        Self::new(edge, edge)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of blocks across and down needed to cover a raster
    pub fn grid_dims(&self, width: usize, height: usize) -> (usize, usize) {
        (width.div_ceil(self.width), height.div_ceil(self.height))
    }
}

impl Default for BlockSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_BLOCK_SIZE,
            height: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major iterator over the block windows of a raster.
///
/// Windows of one block row are yielded left to right before moving down.
/// Edge windows are truncated to the raster extent. A clone replays the
/// remaining windows independently of the original.
#[derive(Debug, Clone)]
pub struct BlockWindows {
    width: usize,
    height: usize,
    block: BlockSize,
    next_index: usize,
    count: usize,
    blocks_across: usize,
}

impl BlockWindows {
    fn window_at(&self, index: usize) -> Window {
        let col = index % self.blocks_across;
        let row = index / self.blocks_across;
        let x = col * self.block.width;
        let y = row * self.block.height;
        Window::new(
            x,
            y,
            self.block.width.min(self.width - x),
            self.block.height.min(self.height - y),
        )
    }

    /// Total number of windows in a full pass
    pub fn total(&self) -> usize {
        self.count
    }
}

impl Iterator for BlockWindows {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.count {
            return None;
        }
        let window = self.window_at(self.next_index);
        self.next_index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockWindows {}

impl std::iter::FusedIterator for BlockWindows {}

/// Enumerate the block windows partitioning a `width x height` raster.
pub fn block_windows(width: usize, height: usize, block: BlockSize) -> BlockWindows {
    let (blocks_across, blocks_down) = block.grid_dims(width, height);
    BlockWindows {
        width,
        height,
        block,
        next_index: 0,
        count: blocks_across * blocks_down,
        blocks_across: blocks_across.max(1),
    }
}
