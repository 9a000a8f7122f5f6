//! The retrying fetcher: one task, bounded attempts, never raises.

use tracing::{debug, instrument, warn};

use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{FetchOutcome, FetchTask, Transport};

/// Fetches one task through `transport`, retrying per `policy`.
///
/// Every failed attempt is logged at warn level. The final result is
/// reported as a [`FetchOutcome`]; errors never propagate past this call.
/// A failed task may leave a partial or empty destination file behind.
#[instrument(skip(transport, task, policy), fields(url = %task.url, kind = %task.kind, index = task.index))]
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    task: &FetchTask,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let timeout = policy.timeout_for(task.kind);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, "attempting fetch");

        match transport
            .fetch_to_file(&task.url, &task.destination, task.kind, timeout)
            .await
        {
            Ok(bytes_written) => {
                return FetchOutcome::Completed {
                    bytes_written,
                    attempts: attempt,
                };
            }
            Err(error) => {
                warn!(
                    url = %task.url,
                    path = %task.destination.display(),
                    attempt,
                    max_attempts = policy.max_attempts(),
                    error = %error,
                    "fetch attempt failed"
                );
                match policy.should_retry(classify_error(&error), attempt) {
                    RetryDecision::Retry { attempt: next } => {
                        debug!(next_attempt = next, "retrying fetch");
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(%reason, "not retrying fetch");
                        return FetchOutcome::Failed {
                            error,
                            attempts: attempt,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::download::{DownloadError, FetchKind};

    /// Replays a scripted sequence of attempt results and records timeouts.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<u64, DownloadError>>>,
        timeouts: Mutex<Vec<Duration>>,
    }

    impl ScriptedTransport {
        fn new(mut script: Vec<Result<u64, DownloadError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                timeouts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.timeouts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch_to_file(
            &self,
            url: &str,
            _destination: &Path,
            _kind: FetchKind,
            timeout: Duration,
        ) -> Result<u64, DownloadError> {
            self.timeouts.lock().unwrap().push(timeout);
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(DownloadError::timeout(url)))
        }
    }

    fn photo_task() -> FetchTask {
        FetchTask::new(0, "https://example.com/a.jpg", "/tmp/photo_0.jpg", FetchKind::Photo)
    }

    #[tokio::test]
    async fn test_first_attempt_success_uses_one_attempt() {
        let transport = ScriptedTransport::new(vec![Ok(12)]);
        let outcome = fetch_with_retry(&transport, &photo_task(), &RetryPolicy::default()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_written(), 12);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let transport = ScriptedTransport::new(vec![
            Err(DownloadError::timeout("https://example.com/a.jpg")),
            Ok(5),
        ]);
        let outcome = fetch_with_retry(&transport, &photo_task(), &RetryPolicy::default()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 2);
    }

    #[tokio::test]
    async fn test_always_failing_consumes_exactly_three_attempts() {
        let transport = ScriptedTransport::new(Vec::new());
        let outcome = fetch_with_retry(&transport, &photo_task(), &RetryPolicy::default()).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_status_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Err(DownloadError::http_status(
            "https://example.com/a.jpg",
            503,
        ))]);
        let outcome = fetch_with_retry(&transport, &photo_task(), &RetryPolicy::default()).await;

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(transport.calls(), 1);
        assert!(matches!(
            outcome.error(),
            Some(DownloadError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_video_task_uses_video_timeout() {
        let transport = ScriptedTransport::new(vec![Ok(1)]);
        let task = FetchTask::new(0, "https://example.com/v.mp4", "/tmp/video_0.mp4", FetchKind::Video);
        fetch_with_retry(&transport, &task, &RetryPolicy::default()).await;

        assert_eq!(
            transport.timeouts.lock().unwrap().as_slice(),
            &[Duration::from_secs(30)]
        );
    }
}
