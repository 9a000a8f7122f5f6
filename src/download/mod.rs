//! Batched HTTP fetching with per-item retry.
//!
//! # Features
//!
//! - One pooled [`HttpClient`] per invocation, shared by all fetches
//! - Fixed per-kind timeouts (5s photo, 30s video) and a 3-attempt budget
//! - Photos buffered in memory, videos streamed to disk in 8 KiB chunks
//! - Fixed-size batches run sequentially, items within a batch concurrently
//! - Per-item failures logged and counted, never raised
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use fast_media_loader::download::{DownloadEngine, FetchKind, HttpClient, NoProgress, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = Path::new("./photos");
//! let urls = vec!["https://example.com/a.jpg".to_string()];
//! let paths = FetchKind::Photo.destination_paths(dir, urls.len());
//! let engine = DownloadEngine::for_kind(FetchKind::Photo, RetryPolicy::default());
//! let client = Arc::new(HttpClient::acquire(engine.batch_size())?);
//! engine
//!     .download_lists(client, &urls, &paths, dir, FetchKind::Photo, &NoProgress)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod fetcher;
mod progress;
mod retry;
pub mod runtime;
mod task;

pub use client::{DEFAULT_USER_AGENT, HttpClient, Transport};
pub use constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PHOTO_BATCH_SIZE, DEFAULT_VIDEO_BATCH_SIZE, MAX_BATCH_SIZE,
    MIN_BATCH_SIZE, PHOTO_TIMEOUT, VIDEO_CHUNK_SIZE, VIDEO_TIMEOUT,
};
pub use engine::{DownloadEngine, DownloadStats, EngineError, pair_tasks};
pub use error::DownloadError;
pub use fetcher::fetch_with_retry;
pub use progress::{NoProgress, ProgressSink, download_progress_bar};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use task::{FetchKind, FetchOutcome, FetchTask};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
