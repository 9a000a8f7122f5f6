//! Frame interval derivation.

use tracing::warn;

/// How often frames of one video are persisted.
///
/// `frame_interval` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    source_fps: Option<f64>,
    requested_rate: u32,
    frame_interval: u64,
}

impl SamplingPlan {
    /// Derives the plan from the source frame rate and the requested samples per second.
    ///
    /// - `frame_interval = max(1, floor(source_fps / requested_rate))`
    /// - unknown, zero or non-finite `source_fps` samples every frame
    /// - `requested_rate == 0` samples every frame
    ///
    /// ```
    /// use fast_media_loader::frames::SamplingPlan;
    ///
    /// assert_eq!(SamplingPlan::new(Some(30.0), 1).frame_interval(), 30);
    /// assert_eq!(SamplingPlan::new(Some(29.97), 2).frame_interval(), 14);
    /// assert_eq!(SamplingPlan::new(None, 1).frame_interval(), 1);
    /// ```
    #[must_use]
    pub fn new(source_fps: Option<f64>, requested_rate: u32) -> Self {
        let usable_fps = source_fps.filter(|fps| fps.is_finite() && *fps > 0.0);

        let frame_interval = match (usable_fps, requested_rate) {
            (_, 0) => {
                warn!("requested frame rate is 0; sampling every decoded frame");
                1
            }
            (None, _) => 1,
            (Some(fps), rate) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let interval = (fps / f64::from(rate)).floor() as u64;
                interval.max(1)
            }
        };

        Self {
            source_fps: usable_fps,
            requested_rate,
            frame_interval,
        }
    }

    /// Decoded-frame stride between persisted frames.
    #[must_use]
    pub fn frame_interval(&self) -> u64 {
        self.frame_interval
    }

    /// Source frame rate, if the container reported a usable one.
    #[must_use]
    pub fn source_fps(&self) -> Option<f64> {
        self.source_fps
    }

    /// Samples per second the caller asked for.
    #[must_use]
    pub fn requested_rate(&self) -> u32 {
        self.requested_rate
    }

    /// Whether the frame at `decoded_index` (zero-based) is persisted.
    #[must_use]
    pub fn should_sample(&self, decoded_index: u64) -> bool {
        decoded_index % self.frame_interval == 0
    }
}
