//! terrargb CLI - DEM to Terrain-RGB conversion

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use terrargb_core::io::{GeoTiffSink, GeoTiffSource, ReaderOptions};
use terrargb_core::{BlockSize, Compression, ElevationSource, OutputProfile, ProfileOptions, Window};
use terrargb_parallel::{encode_raster, PipelineOptions, ProcessingMode};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terrargb")]
#[command(author, version, about = "Convert elevation rasters to Terrain-RGB", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a single-band DEM as a 3-band Terrain-RGB GeoTIFF
    Encode {
        /// Input DEM (GeoTIFF)
        input: PathBuf,
        /// Output Terrain-RGB GeoTIFF
        output: PathBuf,
        /// Block (tile) edge in pixels, a multiple of 16
        #[arg(short, long, default_value = "256")]
        block_size: usize,
        /// Output compression: lzw or deflate
        #[arg(short, long, default_value = "lzw")]
        compression: Compression,
        /// Worker threads (default: all cores)
        #[arg(short, long, conflicts_with = "sequential")]
        threads: Option<usize>,
        /// Process windows one at a time on the calling thread
        #[arg(long)]
        sequential: bool,
        /// Decoded source chunk cache, in MiB
        #[arg(long, default_value = "64")]
        cache_mb: usize,
    },
    /// Show the source profile and the Terrain-RGB profile it would produce
    Info {
        /// Input DEM (GeoTIFF)
        input: PathBuf,
        /// Block (tile) edge in pixels
        #[arg(short, long, default_value = "256")]
        block_size: usize,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn progress_bar(total: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} windows ({eta})")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn open_source(path: &PathBuf, cache_mb: usize) -> Result<GeoTiffSource> {
    let options = ReaderOptions {
        cache_bytes: cache_mb << 20,
    };
    GeoTiffSource::open_with(path, options)
        .with_context(|| format!("Failed to open DEM: {}", path.display()))
}

fn processing_mode(threads: Option<usize>, sequential: bool) -> ProcessingMode {
    match (sequential, threads) {
        (true, _) => ProcessingMode::Sequential,
        (false, Some(n)) => ProcessingMode::ParallelWith(n),
        (false, None) => ProcessingMode::Parallel,
    }
}

fn print_profile(input: &PathBuf, source: &GeoTiffSource, output: &OutputProfile) {
    let profile = source.profile();
    println!("File: {}", input.display());
    println!(
        "Dimensions: {} x {} ({} cells)",
        profile.width,
        profile.height,
        profile.width * profile.height
    );
    println!("Sample type: {}", profile.sample_type);
    let t = &profile.transform;
    println!("Origin: ({:.6}, {:.6})", t.origin_x, t.origin_y);
    println!("Pixel size: {} x {}", t.pixel_width, t.pixel_height);
    let bounds = t.bounds(profile.width, profile.height);
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = &profile.crs {
        println!("CRS: {}", crs);
    }
    match profile.nodata {
        Some(nodata) => println!("NoData: {}", nodata),
        None => println!("NoData: none"),
    }

    let block = output.block_size();
    let (across, down) = block.grid_dims(output.width(), output.height());
    println!("\nTerrain-RGB output:");
    println!("  Bands: {} x {}", output.band_count(), output.sample_type());
    println!("  Blocks: {} ({} x {} = {} windows)", block, across, down, across * down);
    println!("  Compression: {}", output.compression());
    println!("  NoData: none");
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Encode {
            input,
            output,
            block_size,
            compression,
            threads,
            sequential,
            cache_mb,
        } => {
            let start = Instant::now();
            let source = open_source(&input, cache_mb)?;
            let options = PipelineOptions {
                profile: ProfileOptions {
                    block_size: BlockSize::square(block_size)?,
                    compression,
                },
                mode: processing_mode(threads, sequential),
                ..Default::default()
            };

            let (width, height) = (source.profile().width, source.profile().height);
            let (across, down) = options.profile.block_size.grid_dims(width, height);
            let pb = progress_bar((across * down) as u64)?;
            let observer = |_: &Window, done: usize, _: usize| pb.set_position(done as u64);

            let result = encode_raster(
                &source,
                |profile| GeoTiffSink::create(&output, profile),
                &options,
                &observer,
            );
            pb.finish_and_clear();

            let (path, summary) = result
                .with_context(|| format!("Failed to encode {}", input.display()))?;
            let elapsed = start.elapsed();
            info!(
                "Terrain-RGB saved to: {} ({} windows, {:.2?})",
                path.display(),
                summary.windows_written,
                elapsed
            );
        }

        Commands::Info {
            input,
            block_size,
            json,
        } => {
            let source = open_source(&input, 64)?;
            let options = ProfileOptions {
                block_size: BlockSize::square(block_size)?,
                ..Default::default()
            };
            let output = OutputProfile::derive(source.profile(), &options);

            if json {
                let report = serde_json::json!({
                    "file": input.display().to_string(),
                    "source": source.profile(),
                    "output": output,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_profile(&input, &source, &output);
            }
        }
    }

    Ok(())
}
