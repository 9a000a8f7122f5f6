//! HTTP transport shared by every fetch of one invocation.
//!
//! [`HttpClient`] wraps a pooled `reqwest::Client`. It is acquired once per
//! top-level call, cloned cheaply into each concurrent fetch, and released
//! when the last clone is dropped. The [`Transport`] trait is the seam the
//! scheduler fetches through, so tests can substitute instrumented
//! transports.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use url::Url;

use super::constants::VIDEO_CHUNK_SIZE;
use super::{DownloadError, FetchKind};

/// User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("fast-media-loader/", env!("CARGO_PKG_VERSION"));

/// Performs one fetch attempt of a URL into a destination file.
///
/// Implementations must be safe to share across the concurrent fetches of
/// a batch. A single call is a single attempt; retries are layered on top.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` into `destination`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] when a non-success status is
    /// received, and a transport-level variant for anything else.
    async fn fetch_to_file(
        &self,
        url: &str,
        destination: &Path,
        kind: FetchKind,
        timeout: Duration,
    ) -> Result<u64, DownloadError>;
}

/// Pooled HTTP client.
///
/// Cloning shares the underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::time::Duration;
/// use fast_media_loader::download::{FetchKind, HttpClient, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::acquire(10)?;
/// let bytes = client
///     .fetch_to_file(
///         "https://example.com/cat.jpg",
///         Path::new("./photo_0.jpg"),
///         FetchKind::Photo,
///         Duration::from_secs(5),
///     )
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client whose idle pool keeps up to `pool_size` connections per host.
    ///
    /// `pool_size` should be at least the batch size so one batch can reuse
    /// its connections in the next.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialised.
    #[instrument(level = "debug")]
    pub fn acquire(pool_size: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(pool_size.max(1))
            .gzip(true)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        debug!(pool_size, "acquired HTTP client");
        Ok(Self { client })
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, url, destination), fields(url = %url, path = %destination.display()))]
    async fn fetch_to_file(
        &self,
        url: &str,
        destination: &Path,
        kind: FetchKind,
        timeout: Duration,
    ) -> Result<u64, DownloadError> {
        let response = self.send(url, timeout).await?;
        let written = match kind {
            FetchKind::Photo => write_buffered(response, url, destination).await?,
            FetchKind::Video => stream_to_file(response, url, destination).await?,
        };
        debug!(bytes = written, "fetch attempt wrote destination");
        Ok(written)
    }
}

/// Reads the whole body, then writes it in one go.
async fn write_buffered(
    response: reqwest::Response,
    url: &str,
    destination: &Path,
) -> Result<u64, DownloadError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| DownloadError::network(url, e))?;
    tokio::fs::write(destination, &body)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    Ok(body.len() as u64)
}

/// Streams the body to disk in [`VIDEO_CHUNK_SIZE`] writes.
///
/// A failure part-way leaves the partial file in place.
async fn stream_to_file(
    response: reqwest::Response,
    url: &str,
    destination: &Path,
) -> Result<u64, DownloadError> {
    let mut file = File::create(destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
        for piece in chunk.chunks(VIDEO_CHUNK_SIZE) {
            file.write_all(piece)
                .await
                .map_err(|e| DownloadError::io(destination, e))?;
            bytes_written += piece.len() as u64;
        }
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::io(destination, e))?;

    Ok(bytes_written)
}
