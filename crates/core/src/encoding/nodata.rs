//! Void (nodata) sanitization

use std::borrow::Cow;

use crate::raster::ElevationTile;

/// Elevation substituted for voids (sea level)
pub const VOID_FILL: f64 = 0.0;

/// Replace every sample equal to `sentinel` with [`VOID_FILL`].
///
/// Without a sentinel the input is returned borrowed and untouched. The input
/// tile is never modified. Comparison is exact, except that a NaN sentinel
/// matches NaN samples.
pub fn sanitize(tile: &ElevationTile, sentinel: Option<f64>) -> Cow<'_, ElevationTile> {
    let Some(sentinel) = sentinel else {
        return Cow::Borrowed(tile);
    };

    let nan_sentinel = sentinel.is_nan();
    let is_void = |v: f64| if nan_sentinel { v.is_nan() } else { v == sentinel };

    Cow::Owned(tile.map_samples(None, |v| if is_void(v) { VOID_FILL } else { v }))
}
