//! Download orchestration with optional frame extraction.
//!
//! [`MediaLoader`] composes the batch scheduler and the frame sampler. The
//! only differences between loading photos and loading videos are the
//! default batch size and the optional extraction step that follows a
//! video download; both are selected by [`FetchKind`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use fast_media_loader::MediaLoader;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = MediaLoader::new();
//! let urls = vec!["https://example.com/clip.mp4".to_string()];
//! let frames = loader
//!     .load_videos_and_extract_frames(&urls, Path::new("./data"), 1, true)
//!     .await?;
//! println!("{} frames", frames.map_or(0, |f| f.len()));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::runtime::block_on_with;
use crate::download::{
    DownloadEngine, DownloadStats, EngineError, FetchKind, HttpClient, NoProgress, ProgressSink,
    RetryPolicy, Transport,
};
use crate::frames::{FrameError, FrameSampler, VIDEO_EXTENSIONS};

/// Subdirectory of the data folder that receives extracted frames.
pub const FRAMES_DIR_NAME: &str = "frames";

/// Photo extensions recognised when sniffing the media kind of a URL.
pub const PHOTO_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Errors surfaced by [`MediaLoader`].
///
/// Per-item download and decode failures never appear here; they are
/// logged and absorbed further down.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Caller contract violation or scheduler environment failure.
    #[error(transparent)]
    Engine(EngineError),

    /// The pooled HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The video directory could not be listed.
    #[error(transparent)]
    Frames(FrameError),

    /// The blocking frame-extraction task panicked or was cancelled.
    #[error("frame extraction task failed: {0}")]
    Join(#[source] tokio::task::JoinError),

    /// A runtime could not be built for a blocking call.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Guesses the media kind from the extension of the first URL's path.
///
/// Returns `None` when the list is empty or the extension is in neither
/// allow-list.
#[must_use]
pub fn detect_media_kind(urls: &[String]) -> Option<FetchKind> {
    let first = urls.first()?;
    let path = Url::parse(first).map_or_else(|_| first.clone(), |url| url.path().to_string());
    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = file_name.rsplit_once('.')?;

    if PHOTO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        Some(FetchKind::Photo)
    } else if VIDEO_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        Some(FetchKind::Video)
    } else {
        None
    }
}

/// Downloads media lists and optionally extracts frames from videos.
#[derive(Clone)]
pub struct MediaLoader {
    transport: Option<Arc<dyn Transport>>,
    batch_size: Option<usize>,
    retry_policy: RetryPolicy,
    sampler: FrameSampler,
    progress: Arc<dyn ProgressSink>,
}

impl Default for MediaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MediaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLoader")
            .field("custom_transport", &self.transport.is_some())
            .field("batch_size", &self.batch_size)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl MediaLoader {
    /// Loader with per-kind default batch sizes, the default retry policy,
    /// an `ffmpeg`-backed sampler and no progress output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: None,
            batch_size: None,
            retry_policy: RetryPolicy::default(),
            sampler: FrameSampler::default(),
            progress: Arc::new(NoProgress),
        }
    }

    /// Overrides the per-kind default batch size. Validated when a download starts.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Fetches through `transport` instead of acquiring an [`HttpClient`] per call.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the frame sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: FrameSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Reports download progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    fn engine(&self, kind: FetchKind) -> Result<DownloadEngine, LoaderError> {
        match self.batch_size {
            Some(batch_size) => DownloadEngine::new(batch_size, self.retry_policy.clone())
                .map_err(LoaderError::Engine),
            None => Ok(DownloadEngine::for_kind(kind, self.retry_policy.clone())),
        }
    }

    fn transport(&self, engine: &DownloadEngine) -> Result<Arc<dyn Transport>, LoaderError> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        let client = HttpClient::acquire(engine.batch_size()).map_err(LoaderError::Client)?;
        Ok(Arc::new(client))
    }

    /// Downloads `urls[i]` to `paths[i]` for every `i`, creating `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Engine`] for unpaired lists, an out-of-range
    /// batch size or an uncreatable target directory, and
    /// [`LoaderError::Client`] if the HTTP client cannot be built.
    #[instrument(skip(self, kind, urls, paths), fields(kind = %kind, items = urls.len()))]
    pub async fn load(
        &self,
        kind: FetchKind,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
    ) -> Result<DownloadStats, LoaderError> {
        let engine = self.engine(kind)?;
        let transport = self.transport(&engine)?;
        let stats = engine
            .download_lists(transport, urls, paths, target_dir, kind, self.progress.as_ref())
            .await
            .map_err(LoaderError::Engine)?;

        if stats.failed() > 0 {
            warn!(
                failed = stats.failed(),
                total = stats.total(),
                "some downloads failed"
            );
        }
        Ok(stats)
    }

    /// Downloads photos; default batch size 10.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub async fn load_photos(
        &self,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
    ) -> Result<DownloadStats, LoaderError> {
        self.load(FetchKind::Photo, urls, paths, target_dir).await
    }

    /// Downloads videos; default batch size 5.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub async fn load_videos(
        &self,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
    ) -> Result<DownloadStats, LoaderError> {
        self.load(FetchKind::Video, urls, paths, target_dir).await
    }

    /// Downloads `urls` to `data_folder/video_{i}.mp4`, then, when
    /// `extract_frames` is set, samples every video in `data_folder` into
    /// `data_folder/frames/<stem>/`.
    ///
    /// Returns `None` when extraction was not requested.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and
    /// [`extract_frames_from_videos`](Self::extract_frames_from_videos).
    pub async fn load_videos_and_extract_frames(
        &self,
        urls: &[String],
        data_folder: &Path,
        frame_rate: u32,
        extract_frames: bool,
    ) -> Result<Option<Vec<PathBuf>>, LoaderError> {
        let paths = FetchKind::Video.destination_paths(data_folder, urls.len());
        self.load_videos(urls, &paths, data_folder).await?;

        if !extract_frames {
            debug!("frame extraction not requested");
            return Ok(None);
        }

        let frames_dir = data_folder.join(FRAMES_DIR_NAME);
        let frames = self
            .extract_frames_from_videos(data_folder, &frames_dir, frame_rate)
            .await?;
        Ok(Some(frames))
    }

    /// Samples every video directly inside `video_dir` into
    /// `output_dir/<stem>/` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Frames`] if `video_dir` cannot be listed and
    /// [`LoaderError::Join`] if the extraction task does not complete.
    pub async fn extract_frames_from_videos(
        &self,
        video_dir: &Path,
        output_dir: &Path,
        frame_rate: u32,
    ) -> Result<Vec<PathBuf>, LoaderError> {
        let sampler = self.sampler.clone();
        let video_dir = video_dir.to_path_buf();
        let output_dir = output_dir.to_path_buf();
        let frames = tokio::task::spawn_blocking(move || {
            sampler.sample_directory(&video_dir, &output_dir, frame_rate)
        })
        .await
        .map_err(LoaderError::Join)?
        .map_err(LoaderError::Frames)?;

        info!(frames = frames.len(), "frames extracted");
        Ok(frames)
    }

    /// Blocking form of [`load_photos`](Self::load_photos).
    ///
    /// `context` is an optional handle to a multi-thread runtime owned by
    /// the caller; without one a runtime lives for the duration of the call.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load), plus [`LoaderError::Runtime`].
    pub fn load_photos_blocking(
        &self,
        context: Option<&Handle>,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
    ) -> Result<DownloadStats, LoaderError> {
        block_on_with(context, self.load_photos(urls, paths, target_dir))
            .map_err(LoaderError::Runtime)?
    }

    /// Blocking form of [`load_videos`](Self::load_videos).
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load), plus [`LoaderError::Runtime`].
    pub fn load_videos_blocking(
        &self,
        context: Option<&Handle>,
        urls: &[String],
        paths: &[PathBuf],
        target_dir: &Path,
    ) -> Result<DownloadStats, LoaderError> {
        block_on_with(context, self.load_videos(urls, paths, target_dir))
            .map_err(LoaderError::Runtime)?
    }

    /// Blocking form of [`load_videos_and_extract_frames`](Self::load_videos_and_extract_frames).
    ///
    /// # Errors
    ///
    /// See the async form, plus [`LoaderError::Runtime`].
    pub fn load_videos_and_extract_frames_blocking(
        &self,
        context: Option<&Handle>,
        urls: &[String],
        data_folder: &Path,
        frame_rate: u32,
        extract_frames: bool,
    ) -> Result<Option<Vec<PathBuf>>, LoaderError> {
        block_on_with(
            context,
            self.load_videos_and_extract_frames(urls, data_folder, frame_rate, extract_frames),
        )
        .map_err(LoaderError::Runtime)?
    }

    /// Synchronous frame extraction; needs no runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Frames`] if `video_dir` cannot be listed.
    pub fn extract_frames_from_videos_blocking(
        &self,
        video_dir: &Path,
        output_dir: &Path,
        frame_rate: u32,
    ) -> Result<Vec<PathBuf>, LoaderError> {
        self.sampler
            .sample_directory(video_dir, output_dir, frame_rate)
            .map_err(LoaderError::Frames)
    }
}
