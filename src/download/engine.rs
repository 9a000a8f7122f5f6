//! Batch scheduler for concurrent downloads with retry support.
//!
//! This module provides the [`DownloadEngine`], which splits positionally
//! paired URL/path lists into fixed-size batches and fetches each batch
//! concurrently through one shared [`Transport`].
//!
//! # Concurrency Model
//!
//! - Batches run strictly in input order
//! - Every task of a batch runs in its own Tokio task
//! - All tasks of a batch are joined before the next batch is spawned, so
//!   at most `batch_size` fetches are ever in flight
//! - Progress advances once per finished item, in completion order
//!
//! # Example
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use fast_media_loader::download::{DownloadEngine, FetchKind, HttpClient, NoProgress, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(10, RetryPolicy::default())?;
//! let transport = Arc::new(HttpClient::acquire(engine.batch_size())?);
//! let urls = vec!["https://example.com/a.jpg".to_string()];
//! let paths = vec![PathBuf::from("./photos/photo_0.jpg")];
//! let stats = engine
//!     .download_lists(transport, &urls, &paths, Path::new("./photos"), FetchKind::Photo, &NoProgress)
//!     .await?;
//! println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::constants::{MAX_BATCH_SIZE, MIN_BATCH_SIZE};
use super::fetcher::fetch_with_retry;
use super::progress::ProgressSink;
use super::retry::RetryPolicy;
use super::runtime::block_on_with;
use super::{FetchKind, FetchOutcome, FetchTask, Transport};

/// Error type for download engine operations.
///
/// These are caller contract violations or environment failures; per-item
/// fetch failures are never reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid batch size provided.
    #[error(
        "invalid batch size {value}: must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}"
    )]
    InvalidBatchSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The URL and destination lists are not positionally paired.
    #[error("got {urls} URLs but {paths} destination paths")]
    LengthMismatch {
        /// Number of URLs.
        urls: usize,
        /// Number of destination paths.
        paths: usize,
    },

    /// The target directory could not be created.
    #[error("failed to create target directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A runtime could not be built for a blocking call.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Statistics from one scheduler run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadStats {
    completed: usize,
    failed: usize,
    retried: usize,
    batches: usize,
    bytes: u64,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Returns the total number of items processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }

    /// Returns the number of retry attempts made across all items.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried
    }

    /// Returns the number of batch rounds run.
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns the number of bytes written by successful downloads.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    fn record(&mut self, outcome: &FetchOutcome) {
        self.retried += outcome.attempts().saturating_sub(1) as usize;
        if outcome.is_success() {
            self.completed += 1;
            self.bytes += outcome.bytes_written();
        } else {
            self.failed += 1;
        }
    }
}

/// Pairs `urls[i]` with `paths[i]` into tasks of the given kind.
///
/// # Errors
///
/// Returns [`EngineError::LengthMismatch`] if the lists differ in length.
pub fn pair_tasks(
    urls: &[String],
    paths: &[PathBuf],
    kind: FetchKind,
) -> Result<Vec<FetchTask>, EngineError> {
    if urls.len() != paths.len() {
        return Err(EngineError::LengthMismatch {
            urls: urls.len(),
            paths: paths.len(),
        });
    }
    Ok(urls
        .iter()
        .zip(paths)
        .enumerate()
        .map(|(index, (url, path))| FetchTask::new(index, url.as_str(), path.as_path(), kind))
        .collect())
}

/// Batch scheduler for concurrent downloads.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    /// Maximum fetches in flight, and the size of each batch.
    batch_size: usize,
    /// Retry policy applied to every task.
    retry_policy: RetryPolicy,
}

impl DownloadEngine {
    /// Creates a new engine with the given batch size and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidBatchSize`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use fast_media_loader::download::{DownloadEngine, RetryPolicy};
    ///
    /// let engine = DownloadEngine::new(5, RetryPolicy::default()).unwrap();
    /// assert_eq!(engine.batch_size(), 5);
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(batch_size: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(EngineError::InvalidBatchSize { value: batch_size });
        }

        debug!(
            batch_size,
            max_attempts = retry_policy.max_attempts(),
            "creating download engine"
        );

        Ok(Self {
            batch_size,
            retry_policy,
        })
    }

    /// Creates an engine using the kind's default batch size.
    #[must_use]
    pub fn for_kind(kind: FetchKind, retry_policy: RetryPolicy) -> Self {
        Self {
            batch_size: kind.default_batch_size(),
            retry_policy,
        }
    }

    /// Returns the configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Splits tasks into consecutive batches of at most `batch_size`.
    #[must_use]
    pub fn plan_batches<'a>(&self, tasks: &'a [FetchTask]) -> Vec<&'a [FetchTask]> {
        tasks.chunks(self.batch_size).collect()
    }

    /// Downloads positionally paired lists into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LengthMismatch`] for unpaired lists and
    /// [`EngineError::CreateDir`] if the target directory cannot be created.
    /// Individual download failures do NOT cause this method to error.
    pub async fn download_lists(
        &self,
        transport: Arc<dyn Transport>,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
        kind: FetchKind,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadStats, EngineError> {
        let tasks = pair_tasks(urls, paths, kind)?;
        self.download_tasks(transport, tasks, target_dir, progress)
            .await
    }

    /// Runs every task, one batch at a time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CreateDir`] if the target directory cannot be
    /// created. Individual download failures are logged and counted in the
    /// returned stats.
    #[instrument(skip(self, transport, tasks, target_dir, progress), fields(target_dir = %target_dir.display(), items = tasks.len()))]
    pub async fn download_tasks(
        &self,
        transport: Arc<dyn Transport>,
        tasks: Vec<FetchTask>,
        target_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadStats, EngineError> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|source| EngineError::CreateDir {
                path: target_dir.to_path_buf(),
                source,
            })?;

        let mut stats = DownloadStats::new();
        progress.start(tasks.len() as u64);
        info!(
            items = tasks.len(),
            batch_size = self.batch_size,
            "starting batched download"
        );

        for (batch_index, batch) in self.plan_batches(&tasks).into_iter().enumerate() {
            debug!(batch_index, size = batch.len(), "starting batch");
            self.run_batch(&transport, batch, &mut stats, progress).await;
            stats.batches += 1;
        }

        progress.finish();
        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            retried = stats.retried(),
            batches = stats.batches(),
            "batched download complete"
        );
        Ok(stats)
    }

    async fn run_batch(
        &self,
        transport: &Arc<dyn Transport>,
        batch: &[FetchTask],
        stats: &mut DownloadStats,
        progress: &dyn ProgressSink,
    ) {
        let mut in_flight = JoinSet::new();
        for task in batch {
            let transport = Arc::clone(transport);
            let policy = self.retry_policy.clone();
            let task = task.clone();
            in_flight.spawn(async move {
                let outcome = fetch_with_retry(transport.as_ref(), &task, &policy).await;
                (task, outcome)
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((task, outcome)) => {
                    match &outcome {
                        FetchOutcome::Completed { bytes_written, .. } => {
                            debug!(
                                url = %task.url,
                                path = %task.destination.display(),
                                bytes = bytes_written,
                                "download completed"
                            );
                        }
                        FetchOutcome::Failed { error, attempts } => {
                            warn!(
                                url = %task.url,
                                path = %task.destination.display(),
                                error = %error,
                                attempts,
                                "download failed after all attempts"
                            );
                        }
                    }
                    stats.record(&outcome);
                }
                Err(e) => {
                    // A panicked task counts as a failure; the batch goes on.
                    warn!(error = %e, "download task panicked");
                    stats.failed += 1;
                }
            }
            progress.advance(1);
        }
    }

    /// Blocking form of [`download_lists`](Self::download_lists).
    ///
    /// `context` is an optional handle to a multi-thread runtime owned by the
    /// caller. Without one, a runtime is created for this call and torn down
    /// before returning. Calling this from inside a runtime is supported: the
    /// work moves to a dedicated thread.
    ///
    /// # Errors
    ///
    /// Same as [`download_lists`](Self::download_lists), plus
    /// [`EngineError::Runtime`] if a runtime cannot be built.
    #[allow(clippy::too_many_arguments)]
    pub fn download_lists_blocking(
        &self,
        context: Option<&Handle>,
        transport: Arc<dyn Transport>,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
        kind: FetchKind,
        progress: &dyn ProgressSink,
    ) -> Result<DownloadStats, EngineError> {
        block_on_with(
            context,
            self.download_lists(transport, urls, paths, target_dir, kind, progress),
        )
        .map_err(EngineError::Runtime)?
    }
}
