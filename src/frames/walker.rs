//! Directory-level frame extraction.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::sampler::FrameSampler;
use super::FrameError;

/// File extensions treated as videos, compared case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Container formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoContainer {
    /// MPEG-4 Part 14 (`.mp4`).
    Mp4,
    /// Audio Video Interleave (`.avi`).
    Avi,
    /// QuickTime (`.mov`).
    Mov,
    /// Matroska (`.mkv`).
    Mkv,
    /// Windows Media Video (`.wmv`).
    Wmv,
    /// Flash Video (`.flv`).
    Flv,
    /// WebM (`.webm`).
    Webm,
}

impl VideoContainer {
    /// Matches a file extension (without the dot), ignoring case.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let container = match ext.to_ascii_lowercase().as_str() {
            "mp4" => Self::Mp4,
            "avi" => Self::Avi,
            "mov" => Self::Mov,
            "mkv" => Self::Mkv,
            "wmv" => Self::Wmv,
            "flv" => Self::Flv,
            "webm" => Self::Webm,
            _ => return None,
        };
        Some(container)
    }

    /// Lowercase extension for this container.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Wmv => "wmv",
            Self::Flv => "flv",
            Self::Webm => "webm",
        }
    }
}

impl fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A local file recognised as a video by its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Container inferred from the extension.
    pub container: VideoContainer,
}

impl VideoFile {
    /// Returns `None` when the extension is not in [`VIDEO_EXTENSIONS`].
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let container = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(VideoContainer::from_extension)?;
        Some(Self { path, container })
    }

    /// File name without extension; names the per-video frame directory.
    #[must_use]
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

/// Whether `path` carries one of [`VIDEO_EXTENSIONS`].
#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(VideoContainer::from_extension)
        .is_some()
}

/// Lists the video files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into.
///
/// # Errors
///
/// Returns [`FrameError::Directory`] when `dir` cannot be read.
pub fn find_videos(dir: &Path) -> Result<Vec<VideoFile>, FrameError> {
    let entries = fs::read_dir(dir).map_err(|e| FrameError::directory(dir, e))?;

    let mut videos = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FrameError::directory(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(video) = VideoFile::from_path(path) {
            videos.push(video);
        }
    }
    videos.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(videos)
}

impl FrameSampler {
    /// Samples every video directly inside `video_dir` into
    /// `output_dir/<video stem>/`, returning all produced paths in video order.
    ///
    /// A video that fails contributes its partial output (possibly nothing)
    /// and the walk moves on.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Directory`] when `video_dir` cannot be listed.
    #[instrument(skip(self, video_dir), fields(video_dir = %video_dir.display()))]
    pub fn sample_directory(
        &self,
        video_dir: &Path,
        output_dir: &Path,
        requested_rate: u32,
    ) -> Result<Vec<PathBuf>, FrameError> {
        let videos = find_videos(video_dir)?;
        if videos.is_empty() {
            warn!(video_dir = %video_dir.display(), "no video files found");
            return Ok(Vec::new());
        }

        let mut all_frames = Vec::new();
        for video in &videos {
            debug!(path = %video.path.display(), container = %video.container, "sampling video");
            let frames = self.sample_video(&video.path, &output_dir.join(video.stem()), requested_rate);
            all_frames.extend(frames);
        }

        info!(
            videos = videos.len(),
            frames = all_frames.len(),
            "directory frame extraction complete"
        );
        Ok(all_frames)
    }
}
