//! Block-wise DEM to Terrain-RGB encoding pipeline
//!
//! Every block window of the source is read, sanitized, encoded and written
//! to the sink exactly once. In parallel modes a rayon pool does the reading
//! and encoding while the calling thread stays the only writer: finished
//! tiles travel through a bounded channel, which also caps how many encoded
//! tiles are held in memory at once.

use rayon::iter::{ParallelBridge, ParallelIterator};
use rayon::ThreadPool;
use terrargb_core::encoding::{encode_tile, sanitize};
use terrargb_core::raster::BlockWindows;
use terrargb_core::{
    block_windows, ElevationSource, EncodedTile, Error, OutputProfile, ProfileOptions, Result,
    RgbSink, Window,
};
use tracing::{debug, info};

use crate::observer::WindowObserver;
use crate::strategy::ProcessingMode;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Output block size and compression
    pub profile: ProfileOptions,
    pub mode: ProcessingMode,
    /// Encoded tiles allowed in flight between workers and the writer
    pub channel_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            profile: ProfileOptions::default(),
            mode: ProcessingMode::default(),
            channel_capacity: 16,
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub windows_written: usize,
    pub profile: OutputProfile,
}

/// Convert `source` into a Terrain-RGB raster.
///
/// The output profile is derived once from the source and handed to
/// `open_sink`; if opening fails no window is read. Any failure aborts the
/// run and is returned with the coordinates of the window it occurred in.
pub fn encode_raster<S, K, F>(
    source: &S,
    open_sink: F,
    options: &PipelineOptions,
    observer: &dyn WindowObserver,
) -> Result<(K::Output, RunSummary)>
where
    S: ElevationSource + ?Sized,
    K: RgbSink,
    F: FnOnce(&OutputProfile) -> Result<K>,
{
    let profile = OutputProfile::derive(source.profile(), &options.profile);
    let pool = options.mode.thread_pool()?;
    let mut sink = open_sink(&profile)?;

    let windows = block_windows(profile.width(), profile.height(), profile.block_size());
    let total = windows.len();
    info!(
        "Encoding {}x{} raster as {} windows of {} ({})",
        profile.width(),
        profile.height(),
        total,
        profile.block_size(),
        options.mode
    );

    let mut writer = Writer {
        sink: &mut sink,
        observer,
        done: 0,
        total,
    };
    match &pool {
        None => {
            for window in windows {
                let tile = encode_window(source, &window)?;
                writer.write(tile)?;
            }
        }
        Some(pool) => run_parallel(source, windows, pool, options.channel_capacity, &mut writer)?,
    }
    let windows_written = writer.done;

    let output = sink.finish()?;
    info!("Wrote {} windows", windows_written);

    Ok((
        output,
        RunSummary {
            windows_written,
            profile,
        },
    ))
}

/// Read, sanitize and encode one window.
pub fn encode_window<S>(source: &S, window: &Window) -> Result<EncodedTile>
where
    S: ElevationSource + ?Sized,
{
    let run = || -> Result<EncodedTile> {
        let source_profile = source.profile();
        window.check_within(source_profile.width, source_profile.height)?;

        let tile = source.read_window(window)?;
        if tile.window() != window {
            return Err(Error::WindowMismatch {
                expected: *window,
                actual: *tile.window(),
            });
        }
        let (er, ec) = window.shape();
        let (ar, ac) = tile.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let clean = sanitize(&tile, source_profile.nodata);
        encode_tile(&clean)
    };
    run().map_err(|e| e.at_window(*window))
}

/// Single writer: owns the sink and emits progress events
struct Writer<'a, K> {
    sink: &'a mut K,
    observer: &'a dyn WindowObserver,
    done: usize,
    total: usize,
}

impl<K: RgbSink> Writer<'_, K> {
    fn write(&mut self, tile: EncodedTile) -> Result<()> {
        let window = *tile.window();
        self.sink
            .write_tile(&tile)
            .map_err(|e| e.at_window(window))?;

        self.done += 1;
        debug!("Processed {} ({}/{})", window, self.done, self.total);
        self.observer
            .window_processed(&window, self.done, self.total);
        Ok(())
    }
}

fn run_parallel<S, K>(
    source: &S,
    windows: BlockWindows,
    pool: &ThreadPool,
    capacity: usize,
    writer: &mut Writer<'_, K>,
) -> Result<()>
where
    S: ElevationSource + ?Sized,
    K: RgbSink,
{
    let (tx, rx) = crossbeam_channel::bounded::<Result<EncodedTile>>(capacity.max(1));

    pool.in_place_scope(move |scope| {
        scope.spawn(move |_| {
            // Fails only once the writer has hung up
            let _ = windows.par_bridge().try_for_each_with(tx, |tx, window| {
                tx.send(encode_window(source, &window)).map_err(|_| ())
            });
        });

        // Returning drops the receiver, which stops the producers
        rx.iter().try_for_each(|result| writer.write(result?))
    })
}
