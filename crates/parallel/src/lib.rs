//! # terrargb parallel
//!
//! Block-wise encoding pipeline for Terrain-RGB conversion.
//!
//! This crate provides:
//! - `encode_raster`: drives every block window from source to sink
//! - `ProcessingMode`: sequential or rayon-parallel execution
//! - `WindowObserver`: per-window progress events

pub mod observer;
pub mod pipeline;
pub mod strategy;

pub use observer::{ChannelObserver, NoopObserver, WindowEvent, WindowObserver};
pub use pipeline::{encode_raster, encode_window, PipelineOptions, RunSummary};
pub use strategy::{num_cpus, ProcessingMode};
