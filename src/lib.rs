//! Fast Media Loader
//!
//! Batched concurrent downloading of photo and video URLs to positional
//! file names, with per-item retry, progress reporting and optional
//! uniform-interval frame extraction from the downloaded videos.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - Pooled HTTP transport, retrying fetcher and batch scheduler
//! - [`frames`] - Frame sampling of local videos and directory walking
//! - [`loader`] - The [`MediaLoader`] orchestrator combining both

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod frames;
pub mod loader;
#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use download::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PHOTO_BATCH_SIZE, DEFAULT_VIDEO_BATCH_SIZE, DownloadEngine,
    DownloadError, DownloadStats, EngineError, FailureType, FetchKind, FetchOutcome, FetchTask,
    HttpClient, NoProgress, ProgressSink, RetryDecision, RetryPolicy, Transport, classify_error,
    fetch_with_retry,
};
pub use frames::{FfmpegOpener, FrameError, FrameRecord, FrameSampler, SamplingPlan, VideoOpener};
pub use loader::{LoaderError, MediaLoader, detect_media_kind};
