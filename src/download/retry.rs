//! Retry policy for per-item fetch failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying download errors and determining retry behavior.
//!
//! # Overview
//!
//! When a fetch attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - anything that went wrong before a status
//!   line was read (connect, timeout, body read, local write, bad URL)
//! - [`FailureType::Terminal`] - the server answered with a non-success status
//!
//! The [`RetryPolicy`] retries transient failures immediately, without any
//! backoff delay, until the attempt budget is spent. Terminal failures end
//! the loop on the spot, for photos and videos alike.
//!
//! # Example
//!
//! ```
//! use fast_media_loader::download::{
//!     DownloadError, RetryPolicy, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::timeout("https://example.com/clip.mp4");
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { attempt } => println!("retrying (attempt {attempt})"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::constants::{DEFAULT_MAX_ATTEMPTS, PHOTO_TIMEOUT, VIDEO_TIMEOUT};
use super::{DownloadError, FetchKind};

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The request raised before a response status was read.
    Transient,

    /// A response with a non-success status was received.
    Terminal,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry right away.
    Retry {
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the fetch.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Attempt budget and per-kind timeouts.
///
/// # Default Values
///
/// - `max_attempts`: 3 (one try plus two retries)
/// - photo timeout: 5 seconds
/// - video timeout: 30 seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Per-attempt timeout for photos.
    photo_timeout: Duration,

    /// Per-attempt timeout for videos.
    video_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            photo_timeout: PHOTO_TIMEOUT,
            video_timeout: VIDEO_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, photo_timeout: Duration, video_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            photo_timeout,
            video_timeout,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using default timeouts.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns a copy with the per-kind timeout replaced.
    #[must_use]
    pub fn with_timeout(mut self, kind: FetchKind, timeout: Duration) -> Self {
        match kind {
            FetchKind::Photo => self.photo_timeout = timeout,
            FetchKind::Video => self.video_timeout = timeout,
        }
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Per-attempt timeout for the given kind.
    #[must_use]
    pub fn timeout_for(&self, kind: FetchKind) -> Duration {
        match kind {
            FetchKind::Photo => self.photo_timeout,
            FetchKind::Video => self.video_timeout,
        }
    }

    /// Determines whether to retry a failed attempt.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Terminal {
            return RetryDecision::DoNotRetry {
                reason: "server rejected the request".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HttpStatus | Terminal |
/// | Timeout | Transient |
/// | Network | Transient |
/// | Io | Transient |
/// | InvalidUrl | Transient |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { .. } => FailureType::Terminal,
        DownloadError::Timeout { .. }
        | DownloadError::Network { .. }
        | DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. } => FailureType::Transient,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.timeout_for(FetchKind::Photo), Duration::from_secs(5));
        assert_eq!(policy.timeout_for(FetchKind::Video), Duration::from_secs(30));
    }

    #[test]
    fn test_with_max_attempts_clamps_to_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, PHOTO_TIMEOUT, VIDEO_TIMEOUT).max_attempts(), 1);
    }

    #[test]
    fn test_with_timeout_overrides_one_kind() {
        let policy =
            RetryPolicy::default().with_timeout(FetchKind::Video, Duration::from_secs(90));
        assert_eq!(policy.timeout_for(FetchKind::Video), Duration::from_secs(90));
        assert_eq!(policy.timeout_for(FetchKind::Photo), PHOTO_TIMEOUT);
    }

    #[test]
    fn test_transient_failures_retry_until_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2 }
        );
        assert_eq!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { attempt: 3 }
        );
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_terminal_failure_never_retries() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(FailureType::Terminal, 1);
        match decision {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("rejected")),
            RetryDecision::Retry { .. } => panic!("status failures must not retry"),
        }
    }

    #[test]
    fn test_classify_http_status_is_terminal() {
        for status in [400, 403, 404, 429, 500, 503] {
            let error = DownloadError::http_status("https://example.com/a.jpg", status);
            assert_eq!(classify_error(&error), FailureType::Terminal, "status {status}");
        }
    }

    #[test]
    fn test_classify_transport_errors_are_transient() {
        assert_eq!(
            classify_error(&DownloadError::timeout("https://example.com")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::invalid_url("::")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&DownloadError::io(
                "/tmp/x",
                std::io::Error::other("disk full")
            )),
            FailureType::Transient
        );
    }
}
