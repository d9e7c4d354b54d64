//! End-to-end tests for the encoding pipeline.

use std::fs::File;
use std::path::Path;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use terrargb_core::encoding::decode;
use terrargb_core::io::tags::{self, decoder_tag};
use terrargb_core::io::{GeoTiffSink, GeoTiffSource, MemorySink, MemorySource};
use terrargb_core::{BlockSize, Compression, ElevationSource, Error, ProfileOptions};
use terrargb_parallel::{encode_raster, NoopObserver, PipelineOptions, ProcessingMode};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::ColorType;

const MODES: [ProcessingMode; 3] = [
    ProcessingMode::Sequential,
    ProcessingMode::Parallel,
    ProcessingMode::ParallelWith(2),
];

fn options(mode: ProcessingMode, block: usize, compression: Compression) -> PipelineOptions {
    PipelineOptions {
        profile: ProfileOptions {
            block_size: BlockSize::square(block).unwrap(),
            compression,
        },
        mode,
        channel_capacity: 4,
    }
}

#[test]
fn test_small_dem_with_voids() {
    let dem = array![
        [0.0, 100.0, -9999.0, 50.0],
        [10.0, 20.0, 30.0, 40.0],
        [5.0, 5.0, 5.0, 5.0],
        [0.0, 0.0, 0.0, 0.0],
    ];
    let expected = array![
        [0.0, 100.0, 0.0, 50.0],
        [10.0, 20.0, 30.0, 40.0],
        [5.0, 5.0, 5.0, 5.0],
        [0.0, 0.0, 0.0, 0.0],
    ];

    for mode in MODES {
        let source = MemorySource::from_array(dem.clone(), Some(-9999.0));
        let (raster, summary) = encode_raster(
            &source,
            |p| Ok(MemorySink::new(p)),
            &options(mode, 2, Compression::Lzw),
            &NoopObserver,
        )
        .unwrap();

        assert_eq!(summary.windows_written, 4);
        assert_eq!(summary.profile.band_count(), 3);
        assert_eq!(summary.profile.nodata(), None);

        assert_eq!(raster.pixel(0, 0), Some([1, 134, 160]));
        assert_eq!(raster.pixel(0, 1), Some([1, 138, 136]));
        // Void encodes as sea level
        assert_eq!(raster.pixel(0, 2), raster.pixel(0, 0));

        let decoded = raster.decode();
        for ((r, c), &value) in expected.indexed_iter() {
            assert_abs_diff_eq!(decoded[(r, c)], value, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_edge_windows_are_truncated() {
    // 5x5 with 2x2 blocks leaves a 1-pixel edge row and column
    let dem = Array2::from_shape_fn((5, 5), |(r, c)| (r * 5 + c) as f64 * 10.0);
    for mode in MODES {
        let source = MemorySource::from_array(dem.clone(), None);
        let (raster, summary) = encode_raster(
            &source,
            |p| Ok(MemorySink::new(p)),
            &options(mode, 2, Compression::Lzw),
            &NoopObserver,
        )
        .unwrap();

        assert_eq!(summary.windows_written, 9);
        let decoded = raster.decode();
        for ((r, c), &value) in dem.indexed_iter() {
            assert_abs_diff_eq!(decoded[(r, c)], value, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_out_of_range_elevations_saturate() {
    let dem = array![[-20_000.0, 2_000_000.0], [f64::NAN, -10_000.0]];
    let source = MemorySource::from_array(dem, None);
    let (raster, _) = encode_raster(
        &source,
        |p| Ok(MemorySink::new(p)),
        &options(ProcessingMode::Sequential, 2, Compression::Lzw),
        &NoopObserver,
    )
    .unwrap();

    assert_eq!(raster.pixel(0, 0), Some([0, 0, 0]));
    assert_eq!(raster.pixel(0, 1), Some([255, 255, 255]));
    assert_eq!(raster.pixel(1, 0), Some([0, 0, 0]));
    assert_eq!(raster.pixel(1, 1), Some([0, 0, 0]));
}

fn write_dem(path: &Path, width: u32, height: u32, data: &[f32]) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<Gray32Float>(width, height).unwrap();
    image
        .encoder()
        .write_tag(decoder_tag(tags::MODEL_PIXEL_SCALE), &[25.0f64, 25.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            decoder_tag(tags::MODEL_TIEPOINT),
            &[0.0f64, 0.0, 0.0, 300_000.0, 5_000_000.0, 0.0][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(
            decoder_tag(tags::GEO_KEY_DIRECTORY),
            &[1u16, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32618][..],
        )
        .unwrap();
    image
        .encoder()
        .write_tag(decoder_tag(tags::GDAL_NODATA), "-32768")
        .unwrap();
    image.write_data(data).unwrap();
}

#[test]
fn test_geotiff_round_trip() {
    let (width, height) = (40usize, 24usize);
    let data: Vec<f32> = (0..width * height)
        .map(|i| {
            if i % 11 == 0 {
                -32768.0
            } else {
                -50.0 + i as f32 * 3.25
            }
        })
        .collect();

    for mode in MODES {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dem.tif");
        let output = dir.path().join("terrain.tif");
        write_dem(&input, width as u32, height as u32, &data);

        let source = GeoTiffSource::open(&input).unwrap();
        assert_eq!(source.profile().nodata, Some(-32768.0));

        let (path, summary) = encode_raster(
            &source,
            |p| GeoTiffSink::create(&output, p),
            &options(mode, 16, Compression::Deflate),
            &NoopObserver,
        )
        .unwrap();
        assert_eq!(path, output);
        assert_eq!(summary.windows_written, 6);

        let mut decoder = Decoder::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (width as u32, height as u32));
        assert_eq!(decoder.colortype().unwrap(), ColorType::RGB(8));
        assert!(decoder
            .get_tag_ascii_string(decoder_tag(tags::GDAL_NODATA))
            .is_err());
        assert_eq!(
            decoder
                .get_tag_f64_vec(decoder_tag(tags::MODEL_TIEPOINT))
                .unwrap(),
            vec![0.0, 0.0, 0.0, 300_000.0, 5_000_000.0, 0.0]
        );
        assert_eq!(
            decoder
                .get_tag_u16_vec(decoder_tag(tags::GEO_KEY_DIRECTORY))
                .unwrap(),
            vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32618]
        );

        let pixels = match decoder.read_image().unwrap() {
            DecodingResult::U8(buf) => buf,
            _ => panic!("expected 8-bit samples"),
        };
        for (i, &value) in data.iter().enumerate() {
            let rgb = [pixels[i * 3], pixels[i * 3 + 1], pixels[i * 3 + 2]];
            let expected = if value == -32768.0 { 0.0 } else { value as f64 };
            assert_abs_diff_eq!(decode(rgb), expected, epsilon = 0.05 + 1e-9);
        }
    }
}

#[test]
fn test_failed_run_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("terrain.tif");
    let source = MemorySource::from_array(Array2::zeros((20, 20)), None);

    // 20 is not a valid GeoTIFF tile edge
    let err = encode_raster(
        &source,
        |p| GeoTiffSink::create(&output, p),
        &options(ProcessingMode::Sequential, 20, Compression::Lzw),
        &NoopObserver,
    )
    .unwrap_err();

    assert!(matches!(err, Error::InvalidParameter { .. }));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
