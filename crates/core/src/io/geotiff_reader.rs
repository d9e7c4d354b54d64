//! Native GeoTIFF window reader
//!
//! Uses the `tiff` crate to decode only the strips or tiles a window
//! touches, so memory stays proportional to the window, not the raster.
//! Single-band rasters only.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::debug;

use crate::crs::{GeoKeyDirectory, CRS};
use crate::error::{Error, Result};
use crate::io::chunk_cache::{Chunk, ChunkCache};
use crate::io::tags::{self, decoder_tag};
use crate::io::ElevationSource;
use crate::profile::{SampleType, SourceProfile};
use crate::raster::{ElevationTile, GeoTransform, Window};

/// Options for opening a GeoTIFF source
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Memory budget for decoded chunks kept between window reads
    pub cache_bytes: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            cache_bytes: 64 << 20,
        }
    }
}

struct ReaderState {
    decoder: Decoder<BufReader<File>>,
    cache: ChunkCache,
}

/// Single-band GeoTIFF opened for windowed reads.
pub struct GeoTiffSource {
    profile: SourceProfile,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    state: Mutex<ReaderState>,
}

impl GeoTiffSource {
    /// Open a GeoTIFF with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ReaderOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let (width, height) = decoder.dimensions()?;
        let bits = match decoder.colortype()? {
            ColorType::Gray(bits) => u16::from(bits),
            other => {
                return Err(Error::UnsupportedDataType(format!(
                    "expected a single-band raster, found {:?}",
                    other
                )))
            }
        };
        let sample_format = decoder
            .get_tag_u32(decoder_tag(tags::SAMPLE_FORMAT))
            .map(|v| v as u16)
            .unwrap_or(1);
        let sample_type = SampleType::from_tiff(bits, sample_format)?;

        let profile = SourceProfile {
            width: width as usize,
            height: height as usize,
            transform: read_geotransform(&mut decoder).unwrap_or_default(),
            crs: read_crs(&mut decoder),
            nodata: read_nodata(&mut decoder).and_then(|v| sample_type.stored_value(v)),
            sample_type,
        };

        let (cw, ch) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (cw as usize, ch as usize);
        if chunk_width == 0 || chunk_height == 0 {
            return Err(Error::Tiff("zero-sized strip or tile".into()));
        }
        let chunks_across = profile.width.div_ceil(chunk_width);
        let cache = ChunkCache::with_budget(options.cache_bytes, chunk_width * chunk_height);

        debug!(
            "Opened {}: {}x{} {}, chunks {}x{}, nodata {:?}, cache {} chunks",
            path.as_ref().display(),
            profile.width,
            profile.height,
            profile.sample_type,
            chunk_width,
            chunk_height,
            profile.nodata,
            cache.capacity()
        );

        Ok(Self {
            profile,
            chunk_width,
            chunk_height,
            chunks_across,
            state: Mutex::new(ReaderState { decoder, cache }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReaderState>> {
        self.state
            .lock()
            .map_err(|_| Error::Other("GeoTIFF reader lock poisoned".into()))
    }
}

impl ElevationSource for GeoTiffSource {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    fn read_window(&self, window: &Window) -> Result<ElevationTile> {
        window.check_within(self.profile.width, self.profile.height)?;

        let mut samples = vec![0.0; window.area()];
        let first_col = window.x / self.chunk_width;
        let last_col = (window.right() - 1) / self.chunk_width;
        let first_row = window.y / self.chunk_height;
        let last_row = (window.bottom() - 1) / self.chunk_height;

        let mut guard = self.lock()?;
        let ReaderState { decoder, cache } = &mut *guard;

        for chunk_row in first_row..=last_row {
            for chunk_col in first_col..=last_col {
                let index = chunk_row * self.chunks_across + chunk_col;
                if !cache.contains(index) {
                    let chunk = decode_chunk(decoder, index)?;
                    cache.insert(index, chunk);
                }
                let chunk = cache
                    .get(index)
                    .ok_or_else(|| Error::Other(format!("chunk {} evicted while in use", index)))?;

                let extent = Window::new(
                    chunk_col * self.chunk_width,
                    chunk_row * self.chunk_height,
                    chunk.width,
                    chunk.height,
                );
                let Some(overlap) = window.intersection(&extent) else {
                    continue;
                };

                for row in overlap.y..overlap.bottom() {
                    let src = (row - extent.y) * chunk.width + (overlap.x - extent.x);
                    let dst = (row - window.y) * window.width + (overlap.x - window.x);
                    samples[dst..dst + overlap.width]
                        .copy_from_slice(&chunk.samples[src..src + overlap.width]);
                }
            }
        }
        drop(guard);

        ElevationTile::from_vec(*window, samples, self.profile.nodata)
    }
}

fn decode_chunk(decoder: &mut Decoder<BufReader<File>>, index: usize) -> Result<Chunk> {
    let index = u32::try_from(index).map_err(|_| Error::Tiff("chunk index overflow".into()))?;
    let (width, height) = decoder.chunk_data_dimensions(index);
    let samples = samples_to_f64(decoder.read_chunk(index)?)?;

    let (width, height) = (width as usize, height as usize);
    if samples.len() < width * height {
        return Err(Error::Tiff(format!(
            "chunk {} holds {} samples, expected {}x{}",
            index,
            samples.len(),
            width,
            height
        )));
    }
    Ok(Chunk {
        width,
        height,
        samples,
    })
}

fn samples_to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    fn cast<T: num_traits::ToPrimitive>(buf: Vec<T>) -> Vec<f64> {
        buf.into_iter()
            .map(|v| v.to_f64().unwrap_or(f64::NAN))
            .collect()
    }

    let data = match result {
        DecodingResult::U8(buf) => cast(buf),
        DecodingResult::U16(buf) => cast(buf),
        DecodingResult::U32(buf) => cast(buf),
        DecodingResult::U64(buf) => cast(buf),
        DecodingResult::I8(buf) => cast(buf),
        DecodingResult::I16(buf) => cast(buf),
        DecodingResult::I32(buf) => cast(buf),
        DecodingResult::I64(buf) => cast(buf),
        DecodingResult::F32(buf) => cast(buf),
        DecodingResult::F64(buf) => buf,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };
    Ok(data)
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
fn read_geotransform(decoder: &mut Decoder<BufReader<File>>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(decoder_tag(tags::MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(decoder_tag(tags::MODEL_TIEPOINT)).ok();
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if let Some(gt) = GeoTransform::from_tiepoint_scale(&tiepoint, &scale) {
            return Some(gt);
        }
    }

    let matrix = decoder
        .get_tag_f64_vec(decoder_tag(tags::MODEL_TRANSFORMATION))
        .ok()?;
    GeoTransform::from_model_transformation(&matrix)
}

fn read_crs(decoder: &mut Decoder<BufReader<File>>) -> Option<CRS> {
    let directory = decoder
        .get_tag_u16_vec(decoder_tag(tags::GEO_KEY_DIRECTORY))
        .ok()?;
    let doubles = decoder
        .get_tag_f64_vec(decoder_tag(tags::GEO_DOUBLE_PARAMS))
        .unwrap_or_default();
    let ascii = decoder
        .get_tag_ascii_string(decoder_tag(tags::GEO_ASCII_PARAMS))
        .ok();
    Some(CRS::from_geo_keys(GeoKeyDirectory {
        directory,
        doubles,
        ascii,
    }))
}

fn read_nodata(decoder: &mut Decoder<BufReader<File>>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(decoder_tag(tags::GDAL_NODATA))
        .ok()?;
    parse_nodata(&text)
}

/// GDAL stores nodata as ASCII, e.g. `"-9999"`, `"nan"`, `"-3.4028234663852886e+38"`
fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    text.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::colortype::Gray32Float;
    use tiff::encoder::TiffEncoder;

    #[test]
    fn test_parse_nodata() {
        assert_eq!(parse_nodata("-9999"), Some(-9999.0));
        assert_eq!(parse_nodata("32767\0"), Some(32767.0));
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert_eq!(parse_nodata(""), None);
    }

    fn write_dem(path: &Path, width: u32, height: u32, nodata: Option<&str>) -> Vec<f32> {
        let data: Vec<f32> = (0..width * height).map(|i| i as f32 * 0.5).collect();
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(width, height).unwrap();
        image
            .encoder()
            .write_tag(decoder_tag(tags::MODEL_PIXEL_SCALE), &[30.0f64, 30.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(
                decoder_tag(tags::MODEL_TIEPOINT),
                &[0.0f64, 0.0, 0.0, 500_000.0, 4_000_000.0, 0.0][..],
            )
            .unwrap();
        image
            .encoder()
            .write_tag(
                decoder_tag(tags::GEO_KEY_DIRECTORY),
                &[1u16, 1, 0, 1, 3072, 0, 1, 32647][..],
            )
            .unwrap();
        if let Some(nodata) = nodata {
            image
                .encoder()
                .write_tag(decoder_tag(tags::GDAL_NODATA), nodata)
                .unwrap();
        }
        image.write_data(&data).unwrap();
        data
    }

    #[test]
    fn test_open_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        write_dem(&path, 40, 30, Some("-9999"));

        let source = GeoTiffSource::open(&path).unwrap();
        let profile = source.profile();
        assert_eq!((profile.width, profile.height), (40, 30));
        assert_eq!(profile.nodata, Some(-9999.0));
        assert_eq!(profile.sample_type, SampleType::Float32);
        assert_eq!(profile.transform.origin_x, 500_000.0);
        assert_eq!(profile.transform.pixel_height, -30.0);
        assert_eq!(profile.crs.as_ref().and_then(|c| c.epsg()), Some(32647));
    }

    #[test]
    fn test_float32_nodata_matches_stored_voids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        let data = [-9999.9f32, 12.5, 30.0, -9999.9];
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(2, 2).unwrap();
        image
            .encoder()
            .write_tag(decoder_tag(tags::GDAL_NODATA), "-9999.9")
            .unwrap();
        image.write_data(&data).unwrap();

        let source = GeoTiffSource::open(&path).unwrap();
        let nodata = source.profile().nodata;
        assert_eq!(nodata, Some(f64::from(-9999.9f32)));

        let tile = source.read_window(&Window::new(0, 0, 2, 2)).unwrap();
        let clean = crate::encoding::sanitize(&tile, nodata);
        assert_eq!(clean.data().as_slice().unwrap(), &[0.0, 12.5, 30.0, 0.0]);
    }

    #[test]
    fn test_read_window_matches_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        let data = write_dem(&path, 40, 30, None);
        let source = GeoTiffSource::open_with(
            &path,
            // Tiny cache to force re-decoding
            ReaderOptions { cache_bytes: 1 },
        )
        .unwrap();
        assert_eq!(source.profile().nodata, None);

        let window = Window::new(13, 7, 20, 17);
        let tile = source.read_window(&window).unwrap();
        for r in 0..window.height {
            for c in 0..window.width {
                let expected = data[(window.y + r) * 40 + window.x + c] as f64;
                assert_eq!(tile.data()[(r, c)], expected);
            }
        }

        assert!(source.read_window(&Window::new(30, 20, 11, 1)).is_err());
    }
}
