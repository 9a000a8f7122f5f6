//! Fetch tasks, fetch kinds and per-task outcomes.

use std::fmt;
use std::path::{Path, PathBuf};

use super::DownloadError;
use super::constants::{DEFAULT_PHOTO_BATCH_SIZE, DEFAULT_VIDEO_BATCH_SIZE};

/// Kind of media being fetched.
///
/// The kind selects the per-attempt timeout, the default batch size, the
/// write strategy (buffered vs streamed) and the positional file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// Small images, buffered in memory before writing.
    Photo,
    /// Larger files, streamed to disk in fixed-size chunks.
    Video,
}

impl FetchKind {
    /// Default number of concurrent fetches per batch for this kind.
    #[must_use]
    pub fn default_batch_size(self) -> usize {
        match self {
            Self::Photo => DEFAULT_PHOTO_BATCH_SIZE,
            Self::Video => DEFAULT_VIDEO_BATCH_SIZE,
        }
    }

    /// Prefix used for positional destination names (`photo_0.jpg`).
    #[must_use]
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    /// Extension used for positional destination names.
    ///
    /// Fixed per kind; the remote content type is not consulted.
    #[must_use]
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Photo => "jpg",
            Self::Video => "mp4",
        }
    }

    /// Builds `{dir}/{prefix}_{index}.{ext}` for every index in `0..count`.
    #[must_use]
    pub fn destination_paths(self, dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|index| {
                dir.join(format!(
                    "{}_{index}.{}",
                    self.file_prefix(),
                    self.file_extension()
                ))
            })
            .collect()
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_prefix())
    }
}

/// One locator paired with one destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Remote URL to fetch.
    pub url: String,
    /// Where the body is written.
    pub destination: PathBuf,
    /// Media kind, selects timeout and write strategy.
    pub kind: FetchKind,
    /// Position of the task in the caller's input lists.
    pub index: usize,
}

impl FetchTask {
    /// Creates a new task.
    pub fn new(
        index: usize,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        kind: FetchKind,
    ) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            kind,
            index,
        }
    }
}

/// Result of fetching one task, after retries.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The body was written to the destination.
    Completed {
        /// Bytes written to the destination file.
        bytes_written: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// The task failed terminally.
    Failed {
        /// The error from the last attempt.
        error: DownloadError,
        /// Attempts used before giving up.
        attempts: u32,
    },
}

impl FetchOutcome {
    /// Returns true when the destination was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Bytes written, zero for failures.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Completed { bytes_written, .. } => *bytes_written,
            Self::Failed { .. } => 0,
        }
    }

    /// Number of attempts consumed.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// The terminal error, if the task failed.
    #[must_use]
    pub fn error(&self) -> Option<&DownloadError> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
