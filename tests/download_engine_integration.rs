//! Integration tests for the batch scheduler.
//!
//! Instrumented in-process transports check the concurrency ceiling, batch
//! ordering and retry budget; wiremock covers the real HTTP path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fast_media_loader::download::{
    DownloadEngine, DownloadError, FetchKind, HttpClient, NoProgress, ProgressSink, RetryPolicy,
    Transport,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://media.example.com/{i}.jpg")).collect()
}

/// Tracks how many fetches are running at once.
#[derive(Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl Transport for ConcurrencyProbe {
    async fn fetch_to_file(
        &self,
        _url: &str,
        destination: &Path,
        _kind: FetchKind,
        _timeout: Duration,
    ) -> Result<u64, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tokio::fs::write(destination, b"x")
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        Ok(1)
    }
}

/// Records start and end instants per URL; the first `slow` URLs are delayed.
struct TimelineTransport {
    slow: usize,
    events: Mutex<Vec<(usize, Instant, Instant)>>,
}

#[async_trait]
impl Transport for TimelineTransport {
    async fn fetch_to_file(
        &self,
        url: &str,
        destination: &Path,
        _kind: FetchKind,
        _timeout: Duration,
    ) -> Result<u64, DownloadError> {
        let index: usize = url
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(usize::MAX);
        let started = Instant::now();
        let delay = if index < self.slow { 120 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let finished = Instant::now();
        self.events.lock().unwrap().push((index, started, finished));
        if index == 1 {
            return Err(DownloadError::http_status(url, 500));
        }
        tokio::fs::write(destination, b"x")
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        Ok(1)
    }
}

/// Fails every attempt with a transient error.
#[derive(Default)]
struct AlwaysTimesOut {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for AlwaysTimesOut {
    async fn fetch_to_file(
        &self,
        url: &str,
        _destination: &Path,
        _kind: FetchKind,
        _timeout: Duration,
    ) -> Result<u64, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DownloadError::timeout(url))
    }
}

#[derive(Default)]
struct CountingProgress {
    total: AtomicUsize,
    position: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressSink for CountingProgress {
    fn start(&self, total: u64) {
        self.total.store(usize::try_from(total).unwrap(), Ordering::SeqCst);
    }

    fn advance(&self, delta: u64) {
        self.position
            .fetch_add(usize::try_from(delta).unwrap(), Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_in_flight_fetches_never_exceed_batch_size() {
    let temp = TempDir::new().unwrap();
    let probe = Arc::new(ConcurrencyProbe {
        delay: Duration::from_millis(20),
        ..ConcurrencyProbe::default()
    });
    let engine = DownloadEngine::new(4, RetryPolicy::default()).unwrap();
    let list = urls(11);
    let paths = FetchKind::Photo.destination_paths(temp.path(), list.len());

    let stats = engine
        .download_lists(
            Arc::clone(&probe) as Arc<dyn Transport>,
            &list,
            &paths,
            temp.path(),
            FetchKind::Photo,
            &NoProgress,
        )
        .await
        .unwrap();

    assert_eq!(stats.completed(), 11);
    assert_eq!(stats.batches(), 3);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 11);
    let high_water = probe.high_water.load(Ordering::SeqCst);
    assert!(high_water <= 4, "saw {high_water} concurrent fetches");
    assert!(high_water >= 2, "batch members should overlap");
}

#[tokio::test]
async fn test_next_batch_waits_for_slow_and_failed_items() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(TimelineTransport {
        slow: 1,
        events: Mutex::new(Vec::new()),
    });
    let engine = DownloadEngine::new(2, RetryPolicy::with_max_attempts(1)).unwrap();
    let list = urls(5);
    let paths = FetchKind::Photo.destination_paths(temp.path(), list.len());

    let stats = engine
        .download_lists(
            Arc::clone(&transport) as Arc<dyn Transport>,
            &list,
            &paths,
            temp.path(),
            FetchKind::Photo,
            &NoProgress,
        )
        .await
        .unwrap();

    assert_eq!(stats.completed(), 4);
    assert_eq!(stats.failed(), 1);

    let events = transport.events.lock().unwrap().clone();
    let finish_of = |i: usize| events.iter().find(|e| e.0 == i).unwrap().2;
    let start_of = |i: usize| events.iter().find(|e| e.0 == i).unwrap().1;
    let first_batch_end = finish_of(0).max(finish_of(1));
    assert!(start_of(2) >= first_batch_end);
    assert!(start_of(3) >= first_batch_end);
    assert!(start_of(4) >= finish_of(2).max(finish_of(3)));
}

#[tokio::test]
async fn test_always_failing_item_uses_exactly_three_attempts() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(AlwaysTimesOut::default());
    let engine = DownloadEngine::for_kind(FetchKind::Video, RetryPolicy::default());
    let list = vec!["https://media.example.com/clip.mp4".to_string()];
    let paths = FetchKind::Video.destination_paths(temp.path(), 1);

    let stats = engine
        .download_lists(
            Arc::clone(&transport) as Arc<dyn Transport>,
            &list,
            &paths,
            temp.path(),
            FetchKind::Video,
            &NoProgress,
        )
        .await
        .unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.retried(), 2);
}

#[tokio::test]
async fn test_progress_reaches_total_once() {
    let temp = TempDir::new().unwrap();
    let progress = CountingProgress::default();
    let engine = DownloadEngine::new(3, RetryPolicy::with_max_attempts(1)).unwrap();
    let list = urls(5);
    let paths = FetchKind::Photo.destination_paths(temp.path(), list.len());

    engine
        .download_lists(
            Arc::new(AlwaysTimesOut::default()),
            &list,
            &paths,
            temp.path(),
            FetchKind::Photo,
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(progress.total.load(Ordering::SeqCst), 5);
    assert_eq!(progress.position.load(Ordering::SeqCst), 5);
    assert_eq!(progress.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_lists_create_directory_and_run_no_batches() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("empty");
    let engine = DownloadEngine::new(3, RetryPolicy::default()).unwrap();

    let stats = engine
        .download_lists(
            Arc::new(AlwaysTimesOut::default()),
            &[],
            &[],
            &target,
            FetchKind::Photo,
            &NoProgress,
        )
        .await
        .unwrap();

    assert!(target.is_dir());
    assert_eq!(stats.total(), 0);
    assert_eq!(stats.batches(), 0);
}

#[tokio::test]
async fn test_seven_photos_in_batches_of_three() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/\d+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8\xFFfake-jpeg".to_vec()))
        .expect(7)
        .mount(&mock_server)
        .await;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("photos");
    let list: Vec<String> = (0..7)
        .map(|i| format!("{}/img/{i}.jpg", mock_server.uri()))
        .collect();
    let paths = FetchKind::Photo.destination_paths(&dir, list.len());
    let engine = DownloadEngine::new(3, RetryPolicy::default()).unwrap();
    let client = Arc::new(HttpClient::acquire(engine.batch_size()).unwrap());

    let stats = engine
        .download_lists(client, &list, &paths, &dir, FetchKind::Photo, &NoProgress)
        .await
        .unwrap();

    assert_eq!(stats.completed(), 7);
    assert_eq!(stats.batches(), 3);
    let sizes: Vec<usize> = {
        let tasks = fast_media_loader::download::pair_tasks(&list, &paths, FetchKind::Photo).unwrap();
        engine.plan_batches(&tasks).iter().map(|b| b.len()).collect()
    };
    assert_eq!(sizes, vec![3, 3, 1]);

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let expected: Vec<String> = (0..7).map(|i| format!("photo_{i}.jpg")).collect();
    assert_eq!(names, expected);
    for i in 0..7 {
        let len = std::fs::metadata(dir.join(format!("photo_{i}.jpg"))).unwrap().len();
        assert!(len > 0);
    }
}

#[tokio::test]
async fn test_status_failures_are_absorbed_and_not_retried() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path_regex(r"^/ok/.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/gone/.*$"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp = TempDir::new().unwrap();
    let list = vec![
        format!("{}/ok/a.mp4", mock_server.uri()),
        format!("{}/gone/b.mp4", mock_server.uri()),
        format!("{}/ok/c.mp4", mock_server.uri()),
    ];
    let paths: Vec<PathBuf> = FetchKind::Video.destination_paths(temp.path(), list.len());
    let engine = DownloadEngine::for_kind(FetchKind::Video, RetryPolicy::default());
    let client = Arc::new(HttpClient::acquire(engine.batch_size()).unwrap());

    let stats = engine
        .download_lists(client, &list, &paths, temp.path(), FetchKind::Video, &NoProgress)
        .await
        .unwrap();

    assert_eq!(stats.completed(), 2);
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.retried(), 0);
    assert!(temp.path().join("video_0.mp4").is_file());
    assert!(!temp.path().join("video_1.mp4").exists());
    assert!(temp.path().join("video_2.mp4").is_file());
}

#[test]
fn test_blocking_download_from_plain_thread() {
    let temp = TempDir::new().unwrap();
    let probe = Arc::new(ConcurrencyProbe::default());
    let engine = DownloadEngine::new(2, RetryPolicy::default()).unwrap();
    let list = urls(3);
    let paths = FetchKind::Photo.destination_paths(temp.path(), list.len());

    let stats = engine
        .download_lists_blocking(
            None,
            probe,
            &list,
            &paths,
            temp.path(),
            FetchKind::Photo,
            &NoProgress,
        )
        .unwrap();

    assert_eq!(stats.completed(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_download_inside_runtime_does_not_deadlock() {
    let temp = TempDir::new().unwrap();
    let probe = Arc::new(ConcurrencyProbe::default());
    let engine = DownloadEngine::new(2, RetryPolicy::default()).unwrap();
    let list = urls(4);
    let paths = FetchKind::Photo.destination_paths(temp.path(), list.len());

    let stats = engine
        .download_lists_blocking(
            Some(&tokio::runtime::Handle::current()),
            probe,
            &list,
            &paths,
            temp.path(),
            FetchKind::Photo,
            &NoProgress,
        )
        .unwrap();

    assert_eq!(stats.completed(), 4);
}
