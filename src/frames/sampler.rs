//! Uniform-interval frame sampling of a single video.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use super::decoder::{FfmpegOpener, FrameSource, VideoOpener};
use super::plan::SamplingPlan;
use super::FrameError;

/// Extension of persisted frames.
pub const FRAME_IMAGE_EXTENSION: &str = "jpg";

/// Default samples per second.
pub const DEFAULT_FRAME_RATE: u32 = 1;

/// One persisted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    /// Zero-based position among persisted frames of this video.
    pub sequence_index: u64,
    /// Zero-based position among decoded frames of this video.
    pub decoded_index: u64,
    /// The video the frame came from.
    pub source_video: PathBuf,
    /// Where the image was written.
    pub output_path: PathBuf,
}

/// `frame_000042.jpg` for sequence index 42.
#[must_use]
pub fn frame_file_name(sequence_index: u64) -> String {
    format!("frame_{sequence_index:06}.{FRAME_IMAGE_EXTENSION}")
}

/// Persists every Nth decoded frame of local videos.
///
/// The sampler is synchronous; async callers run it on the blocking pool.
#[derive(Clone)]
pub struct FrameSampler {
    opener: Arc<dyn VideoOpener>,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(Arc::new(FfmpegOpener::default()))
    }
}

impl std::fmt::Debug for FrameSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSampler").finish_non_exhaustive()
    }
}

impl FrameSampler {
    /// Creates a sampler decoding through `opener`.
    #[must_use]
    pub fn new(opener: Arc<dyn VideoOpener>) -> Self {
        Self { opener }
    }

    /// Samples `video` into `output_dir`, returning the produced paths in order.
    ///
    /// Failures are logged and end work on this video only: an unopenable
    /// file yields an empty list, a mid-stream failure keeps the frames
    /// written so far.
    pub fn sample_video(&self, video: &Path, output_dir: &Path, requested_rate: u32) -> Vec<PathBuf> {
        self.sample_video_records(video, output_dir, requested_rate)
            .into_iter()
            .map(|record| record.output_path)
            .collect()
    }

    /// Like [`sample_video`](Self::sample_video) but returns full records.
    #[instrument(skip(self, video), fields(video = %video.display()))]
    pub fn sample_video_records(
        &self,
        video: &Path,
        output_dir: &Path,
        requested_rate: u32,
    ) -> Vec<FrameRecord> {
        let mut records = Vec::new();
        if let Err(e) = self.try_sample(video, output_dir, requested_rate, &mut records) {
            error!(
                video = %video.display(),
                error = %e,
                frames = records.len(),
                "frame extraction failed"
            );
        }
        records
    }

    fn try_sample(
        &self,
        video: &Path,
        output_dir: &Path,
        requested_rate: u32,
        records: &mut Vec<FrameRecord>,
    ) -> Result<(), FrameError> {
        fs::create_dir_all(output_dir).map_err(|e| FrameError::directory(output_dir, e))?;

        // The source is dropped, releasing the decoder, on every path out of here.
        let mut source = self.opener.open(video)?;
        let plan = SamplingPlan::new(source.frame_rate(), requested_rate);
        debug!(
            fps = ?plan.source_fps(),
            requested_rate,
            frame_interval = plan.frame_interval(),
            "sampling plan"
        );

        sample_source(source.as_mut(), &plan, video, output_dir, records)?;

        info!(
            video = %video.display(),
            frames = records.len(),
            "frame extraction complete"
        );
        Ok(())
    }
}

fn sample_source(
    source: &mut dyn FrameSource,
    plan: &SamplingPlan,
    video: &Path,
    output_dir: &Path,
    records: &mut Vec<FrameRecord>,
) -> Result<(), FrameError> {
    let mut decoded_index: u64 = 0;
    while let Some(frame) = source.next_frame()? {
        if plan.should_sample(decoded_index) {
            let sequence_index = records.len() as u64;
            let output_path = output_dir.join(frame_file_name(sequence_index));
            frame
                .save_with_format(&output_path, image::ImageFormat::Jpeg)
                .map_err(|e| FrameError::write(&output_path, e))?;
            records.push(FrameRecord {
                sequence_index,
                decoded_index,
                source_video: video.to_path_buf(),
                output_path,
            });
        }
        decoded_index += 1;
    }
    debug!(decoded = decoded_index, "end of stream");
    Ok(())
}
