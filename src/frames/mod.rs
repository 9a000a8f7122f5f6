//! Frame sampling of local video files.
//!
//! Each video is decoded sequentially and every `frame_interval`-th frame
//! is written as a JPEG named `frame_NNNNNN.jpg`, where
//! `frame_interval = max(1, floor(source_fps / requested_rate))`.
//!
//! Decoding goes through the [`VideoOpener`] seam; the default
//! [`FfmpegOpener`] drives the system `ffprobe` and `ffmpeg` binaries.

mod decoder;
mod error;
mod plan;
mod sampler;
mod walker;

pub use decoder::{FfmpegOpener, FrameSource, VideoOpener};
pub use error::FrameError;
pub use plan::SamplingPlan;
pub use sampler::{
    DEFAULT_FRAME_RATE, FRAME_IMAGE_EXTENSION, FrameRecord, FrameSampler, frame_file_name,
};
pub use walker::{VIDEO_EXTENSIONS, VideoContainer, VideoFile, find_videos, is_video_file};
