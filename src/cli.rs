//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::app_config::MediaType;

/// Download photos or videos concurrently, optionally extracting frames.
///
/// Files are named by position: `photo_{i}.jpg` or `video_{i}.mp4` inside
/// DATA_FOLDER. Extracted frames go to `DATA_FOLDER/frames/<video>/`.
#[derive(Parser, Debug)]
#[command(name = "fast-media-loader")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download, in order
    #[arg(required = true, num_args = 1..)]
    pub urls: Vec<String>,

    /// Folder that receives the downloaded files
    pub data_folder: PathBuf,

    /// Downloads in flight per batch (1-100) [default: 10 photos, 5 videos]
    #[arg(long = "batch_size", visible_alias = "batch-size", value_parser = clap::value_parser!(u16).range(1..=100))]
    pub batch_size: Option<u16>,

    /// Media pathway; `auto` looks at the first URL's extension [default: auto]
    #[arg(long = "media_type", visible_alias = "media-type", value_enum)]
    pub media_type: Option<MediaTypeArg>,

    /// Extract frames from downloaded videos
    #[arg(long = "extract_frames", visible_alias = "extract-frames")]
    pub extract_frames: bool,

    /// Frames sampled per second of video [default: 1]
    #[arg(long = "frame_rate", visible_alias = "frame-rate", value_parser = clap::value_parser!(u32).range(1..))]
    pub frame_rate: Option<u32>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// `--media_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MediaTypeArg {
    /// Download as photos.
    Photo,
    /// Download as videos.
    Video,
    /// Decide from the first URL.
    Auto,
}

impl From<MediaTypeArg> for MediaType {
    fn from(value: MediaTypeArg) -> Self {
        match value {
            MediaTypeArg::Photo => Self::Photo,
            MediaTypeArg::Video => Self::Video,
            MediaTypeArg::Auto => Self::Auto,
        }
    }
}
