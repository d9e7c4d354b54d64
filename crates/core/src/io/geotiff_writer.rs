//! Tiled RGB GeoTIFF writer
//!
//! Writes a classic little-endian TIFF: chunky RGB, 8 bits per sample, one
//! tile per block window. Tiles are compressed and appended as soon as all
//! three bands of their window have arrived; the IFD is written last by
//! [`RgbSink::finish`], which then moves the temporary file into place.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use ndarray::ArrayView2;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io::tags::{self, field_type};
use crate::io::RgbSink;
use crate::profile::{Compression, OutputProfile};
use crate::raster::{Band, Window};

/// TIFF tile edges must be multiples of 16
const TILE_ALIGNMENT: usize = 16;

/// Tile whose bands are still being written, pixel-interleaved
struct PendingTile {
    data: Vec<u8>,
    written: [bool; 3],
}

/// Writes a Terrain-RGB GeoTIFF.
///
/// Nothing appears at the destination path until `finish` succeeds.
pub struct GeoTiffSink {
    profile: OutputProfile,
    path: PathBuf,
    out: BufWriter<NamedTempFile>,
    position: u64,
    tiles_across: usize,
    pending: HashMap<usize, PendingTile>,
    /// `(offset, byte count)` of every tile written so far
    tiles: Vec<Option<(u32, u32)>>,
}

impl GeoTiffSink {
    pub fn create<P: AsRef<Path>>(path: P, profile: &OutputProfile) -> Result<Self> {
        let (width, height) = (profile.width(), profile.height());
        if width == 0 || height == 0 || u32::try_from(width.max(height)).is_err() {
            return Err(Error::InvalidDimensions { width, height });
        }
        let block = profile.block_size();
        if block.width() % TILE_ALIGNMENT != 0 || block.height() % TILE_ALIGNMENT != 0 {
            return Err(Error::InvalidParameter {
                name: "block_size",
                value: block.to_string(),
                reason: format!("GeoTIFF tile edges must be multiples of {}", TILE_ALIGNMENT),
            });
        }

        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".terrargb-")
            .suffix(".tif.part")
            .tempfile_in(&dir)?;

        let mut out = BufWriter::new(tmp);
        // Header; IFD offset patched by finish
        out.write_all(b"II")?;
        out.write_u16::<LittleEndian>(42)?;
        out.write_u32::<LittleEndian>(0)?;

        let (tiles_across, tiles_down) = block.grid_dims(width, height);
        debug!(
            "Writing {} ({}x{}, {} tiles of {}, {})",
            path.display(),
            width,
            height,
            tiles_across * tiles_down,
            block,
            profile.compression()
        );

        Ok(Self {
            profile: profile.clone(),
            path,
            out,
            position: 8,
            tiles_across,
            pending: HashMap::new(),
            tiles: vec![None; tiles_across * tiles_down],
        })
    }

    /// Tile index of a window, which must be exactly one block
    fn tile_index(&self, window: &Window) -> Result<usize> {
        let block = self.profile.block_size();
        let (bw, bh) = (block.width(), block.height());
        let aligned = window.x % bw == 0
            && window.y % bh == 0
            && window.width == bw.min(self.profile.width() - window.x)
            && window.height == bh.min(self.profile.height() - window.y);
        if !aligned {
            return Err(Error::WindowMisaligned {
                window: *window,
                block_width: bw,
                block_height: bh,
            });
        }
        Ok((window.y / bh) * self.tiles_across + window.x / bw)
    }

    fn append_tile(&mut self, index: usize, tile: PendingTile) -> Result<()> {
        let bytes = compress(&tile.data, self.profile.compression())?;
        let offset = self.position;
        let end = offset + bytes.len() as u64;
        if end > u64::from(u32::MAX) {
            return Err(Error::Other(
                "output exceeds the 4 GiB limit of a classic TIFF".into(),
            ));
        }
        self.out.write_all(&bytes)?;
        self.position = end;
        self.tiles[index] = Some((offset as u32, bytes.len() as u32));
        Ok(())
    }

    /// IFD entries sorted by tag
    fn directory(&self, offsets: Vec<u32>, byte_counts: Vec<u32>) -> Vec<(u16, TagValue)> {
        let profile = &self.profile;
        let block = profile.block_size();
        let bits = profile.sample_type().bits();
        let band_count = usize::from(profile.band_count());

        let mut entries = vec![
            (tags::IMAGE_WIDTH, TagValue::Long(vec![profile.width() as u32])),
            (tags::IMAGE_LENGTH, TagValue::Long(vec![profile.height() as u32])),
            (tags::BITS_PER_SAMPLE, TagValue::Short(vec![bits; band_count])),
            (tags::COMPRESSION, TagValue::Short(vec![profile.compression().tiff_code()])),
            (tags::PHOTOMETRIC, TagValue::Short(vec![tags::PHOTOMETRIC_RGB])),
            (tags::SAMPLES_PER_PIXEL, TagValue::Short(vec![profile.band_count()])),
            (tags::PLANAR_CONFIG, TagValue::Short(vec![tags::PLANAR_CHUNKY])),
            (tags::TILE_WIDTH, TagValue::Long(vec![block.width() as u32])),
            (tags::TILE_LENGTH, TagValue::Long(vec![block.height() as u32])),
            (tags::TILE_OFFSETS, TagValue::Long(offsets)),
            (tags::TILE_BYTE_COUNTS, TagValue::Long(byte_counts)),
            (
                tags::SAMPLE_FORMAT,
                TagValue::Short(vec![profile.sample_type().tiff_sample_format(); band_count]),
            ),
        ];

        let transform = profile.transform();
        if transform.is_north_up() {
            let (tiepoint, scale) = transform.to_tiepoint_scale();
            entries.push((tags::MODEL_PIXEL_SCALE, TagValue::Double(scale.to_vec())));
            entries.push((tags::MODEL_TIEPOINT, TagValue::Double(tiepoint.to_vec())));
        } else {
            entries.push((
                tags::MODEL_TRANSFORMATION,
                TagValue::Double(transform.to_model_transformation().to_vec()),
            ));
        }

        if let Some(keys) = profile.crs().and_then(|crs| crs.to_geo_keys()) {
            entries.push((tags::GEO_KEY_DIRECTORY, TagValue::Short(keys.directory)));
            if !keys.doubles.is_empty() {
                entries.push((tags::GEO_DOUBLE_PARAMS, TagValue::Double(keys.doubles)));
            }
            if let Some(ascii) = keys.ascii {
                entries.push((tags::GEO_ASCII_PARAMS, TagValue::Ascii(ascii)));
            }
        }

        entries.sort_by_key(|(tag, _)| *tag);
        entries
    }
}

impl RgbSink for GeoTiffSink {
    type Output = PathBuf;

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
        let index = self.tile_index(window)?;
        let (er, ec) = window.shape();
        let (ar, ac) = samples.dim();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let overlap = Error::WindowOverlap {
            window: *window,
            band: band.number(),
        };
        if self.tiles[index].is_some() {
            return Err(overlap);
        }

        let block = self.profile.block_size();
        let tile_width = block.width();
        let tile = self.pending.entry(index).or_insert_with(|| PendingTile {
            data: vec![0; block.width() * block.height() * 3],
            written: [false; 3],
        });
        if tile.written[band.offset()] {
            return Err(overlap);
        }

        for (r, row) in samples.rows().into_iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                tile.data[(r * tile_width + c) * 3 + band.offset()] = value;
            }
        }
        tile.written[band.offset()] = true;

        if tile.written.iter().all(|&w| w) {
            if let Some(tile) = self.pending.remove(&index) {
                self.append_tile(index, tile)?;
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<PathBuf> {
        let missing = self.tiles.iter().filter(|t| t.is_none()).count();
        if missing > 0 {
            return Err(Error::IncompleteOutput { missing });
        }

        let (offsets, byte_counts): (Vec<u32>, Vec<u32>) = self.tiles.iter().flatten().copied().unzip();
        let entries = self.directory(offsets, byte_counts);

        // IFD must start on a word boundary
        if self.position % 2 == 1 {
            self.out.write_u8(0)?;
            self.position += 1;
        }
        let ifd_offset = self.position;
        let mut data_offset = ifd_offset + 2 + 12 * entries.len() as u64 + 4;

        let mut overflow = Vec::new();
        self.out.write_u16::<LittleEndian>(entries.len() as u16)?;
        for (tag, value) in &entries {
            let bytes = value.to_bytes();
            self.out.write_u16::<LittleEndian>(*tag)?;
            self.out.write_u16::<LittleEndian>(value.field_type())?;
            self.out.write_u32::<LittleEndian>(value.count())?;
            if bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..bytes.len()].copy_from_slice(&bytes);
                self.out.write_all(&inline)?;
            } else {
                self.out.write_u32::<LittleEndian>(data_offset as u32)?;
                data_offset += bytes.len() as u64 + bytes.len() as u64 % 2;
                overflow.push(bytes);
            }
        }
        // No further IFDs
        self.out.write_u32::<LittleEndian>(0)?;
        for bytes in &overflow {
            self.out.write_all(bytes)?;
            if bytes.len() % 2 == 1 {
                self.out.write_u8(0)?;
            }
        }
        if data_offset > u64::from(u32::MAX) {
            return Err(Error::Other(
                "output exceeds the 4 GiB limit of a classic TIFF".into(),
            ));
        }

        self.out.seek(SeekFrom::Start(4))?;
        self.out.write_u32::<LittleEndian>(ifd_offset as u32)?;

        let file = self.out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.as_file().sync_all()?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!(
            "Wrote {} ({} tiles, {} bytes)",
            self.path.display(),
            self.tiles.len(),
            data_offset
        );
        Ok(self.path)
    }
}

fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::Lzw => {
            let mut encoder =
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            encoder
                .encode(data)
                .map_err(|e| Error::Tiff(format!("LZW encode failed: {}", e)))
        }
        Compression::Deflate => {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Value of one IFD entry
enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Double(Vec<f64>),
    Ascii(String),
}

impl TagValue {
    fn field_type(&self) -> u16 {
        match self {
            TagValue::Short(_) => field_type::SHORT,
            TagValue::Long(_) => field_type::LONG,
            TagValue::Double(_) => field_type::DOUBLE,
            TagValue::Ascii(_) => field_type::ASCII,
        }
    }

    fn count(&self) -> u32 {
        let count = match self {
            TagValue::Short(v) => v.len(),
            TagValue::Long(v) => v.len(),
            TagValue::Double(v) => v.len(),
            // NUL terminator
            TagValue::Ascii(s) => s.len() + 1,
        };
        count as u32
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            TagValue::Short(v) => {
                let mut buf = vec![0; v.len() * 2];
                LittleEndian::write_u16_into(v, &mut buf);
                buf
            }
            TagValue::Long(v) => {
                let mut buf = vec![0; v.len() * 4];
                LittleEndian::write_u32_into(v, &mut buf);
                buf
            }
            TagValue::Double(v) => {
                let mut buf = vec![0; v.len() * 8];
                LittleEndian::write_f64_into(v, &mut buf);
                buf
            }
            TagValue::Ascii(s) => {
                let mut buf = s.as_bytes().to_vec();
                buf.push(0);
                buf
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::io::tags::decoder_tag;
    use crate::profile::{ProfileOptions, SourceProfile};
    use crate::raster::{block_windows, BlockSize, GeoTransform};
    use ndarray::Array2;
    use tiff::decoder::{Decoder, DecodingResult};
    use tiff::ColorType;

    fn profile(width: usize, height: usize, compression: Compression) -> OutputProfile {
        let source = SourceProfile::new(width, height)
            .with_transform(GeoTransform::new(100.0, 200.0, 10.0, -10.0))
            .with_crs(Some(CRS::from_epsg(32633)))
            .with_nodata(Some(-9999.0));
        let options = ProfileOptions {
            block_size: BlockSize::square(16).unwrap(),
            compression,
        };
        OutputProfile::derive(&source, &options)
    }

    /// Band value at pixel (row, col): distinct per band
    fn value(band: Band, row: usize, col: usize) -> u8 {
        ((row * 7 + col * 3 + band.offset() * 50) % 256) as u8
    }

    fn write_all(sink: &mut GeoTiffSink, profile: &OutputProfile) {
        for window in block_windows(profile.width(), profile.height(), profile.block_size()) {
            for band in Band::ALL {
                let samples = Array2::from_shape_fn(window.shape(), |(r, c)| {
                    value(band, window.y + r, window.x + c)
                });
                sink.write_band(band, &window, samples.view()).unwrap();
            }
        }
    }

    fn check_output(path: &Path, profile: &OutputProfile) {
        let file = fs::File::open(path).unwrap();
        let mut decoder = Decoder::new(file).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (40, 20));
        assert_eq!(decoder.colortype().unwrap(), ColorType::RGB(8));
        assert!(decoder
            .get_tag_ascii_string(decoder_tag(tags::GDAL_NODATA))
            .is_err());
        assert_eq!(
            decoder
                .get_tag_f64_vec(decoder_tag(tags::MODEL_PIXEL_SCALE))
                .unwrap(),
            vec![10.0, 10.0, 0.0]
        );
        let keys = decoder
            .get_tag_u16_vec(decoder_tag(tags::GEO_KEY_DIRECTORY))
            .unwrap();
        assert_eq!(keys.last(), Some(&32633));

        let image = match decoder.read_image().unwrap() {
            DecodingResult::U8(buf) => buf,
            other => panic!("unexpected sample type: {:?}", std::mem::discriminant(&other)),
        };
        for row in 0..profile.height() {
            for col in 0..profile.width() {
                for band in Band::ALL {
                    let i = (row * profile.width() + col) * 3 + band.offset();
                    assert_eq!(image[i], value(band, row, col), "({}, {})", row, col);
                }
            }
        }
    }

    #[test]
    fn test_write_lzw_and_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        let profile = profile(40, 20, Compression::Lzw);

        let mut sink = GeoTiffSink::create(&path, &profile).unwrap();
        write_all(&mut sink, &profile);
        assert!(!path.exists());
        assert_eq!(sink.finish().unwrap(), path);

        check_output(&path, &profile);
    }

    #[test]
    fn test_write_deflate_and_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        let profile = profile(40, 20, Compression::Deflate);

        let mut sink = GeoTiffSink::create(&path, &profile).unwrap();
        write_all(&mut sink, &profile);
        sink.finish().unwrap();

        check_output(&path, &profile);
    }

    #[test]
    fn test_incomplete_output_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        let profile = profile(40, 20, Compression::Lzw);

        let mut sink = GeoTiffSink::create(&path, &profile).unwrap();
        let window = Window::new(0, 0, 16, 16);
        let samples = Array2::zeros((16, 16));
        for band in Band::ALL {
            sink.write_band(band, &window, samples.view()).unwrap();
        }
        assert!(matches!(
            sink.finish(),
            Err(Error::IncompleteOutput { missing: 5 })
        ));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_misaligned_and_repeated_windows() {
        let dir = tempfile::tempdir().unwrap();
        let profile = profile(40, 20, Compression::Lzw);
        let mut sink = GeoTiffSink::create(dir.path().join("out.tif"), &profile).unwrap();

        let samples = Array2::zeros((16, 16));
        assert!(matches!(
            sink.write_band(Band::Red, &Window::new(8, 0, 16, 16), samples.view()),
            Err(Error::WindowMisaligned { .. })
        ));

        // Edge block is 8 wide and 4 tall
        let edge = Array2::zeros((4, 8));
        let window = Window::new(32, 16, 8, 4);
        sink.write_band(Band::Blue, &window, edge.view()).unwrap();
        assert!(matches!(
            sink.write_band(Band::Blue, &window, edge.view()),
            Err(Error::WindowOverlap { band: 3, .. })
        ));
    }

    #[test]
    fn test_rejects_unaligned_block_size() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceProfile::new(10, 10);
        let options = ProfileOptions {
            block_size: BlockSize::square(10).unwrap(),
            ..Default::default()
        };
        let profile = OutputProfile::derive(&source, &options);
        assert!(matches!(
            GeoTiffSink::create(dir.path().join("out.tif"), &profile),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
