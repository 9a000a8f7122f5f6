//! Error types for frame sampling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while probing, decoding or persisting frames of a local video.
///
/// These are local-resource failures: they end work on one video file and
/// are logged by the sampler, never retried.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The file is missing or is not a readable video container.
    #[error("cannot open video {path}: {reason}")]
    Open {
        /// The video that could not be opened.
        path: PathBuf,
        /// Why opening failed.
        reason: String,
    },

    /// An external decoder tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading decoded frames failed part-way.
    #[error("failed to decode frames of {path}: {source}")]
    Decode {
        /// The video being decoded.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A sampled frame could not be encoded or written.
    #[error("failed to write frame {path}: {source}")]
    Write {
        /// Output path of the frame.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// A directory could not be created or listed.
    #[error("directory error at {path}: {source}")]
    Directory {
        /// The directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl FrameError {
    /// Creates an open error.
    pub fn open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a spawn error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a decode error.
    pub fn decode(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates a directory error.
    pub fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Directory {
            path: path.into(),
            source,
        }
    }
}
