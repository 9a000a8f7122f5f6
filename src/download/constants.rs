//! Constants for the download module (timeouts, retry budget, batch sizes).

use std::time::Duration;

/// Per-attempt timeout for photo fetches (5 seconds).
pub const PHOTO_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-attempt timeout for video fetches (30 seconds).
pub const VIDEO_TIMEOUT: Duration = Duration::from_secs(30);

/// Total attempts per item: the first try plus two retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default number of photos fetched concurrently in one batch.
pub const DEFAULT_PHOTO_BATCH_SIZE: usize = 10;

/// Default number of videos fetched concurrently in one batch.
pub const DEFAULT_VIDEO_BATCH_SIZE: usize = 5;

/// Size of each write when streaming a video body to disk (8 KiB).
pub const VIDEO_CHUNK_SIZE: usize = 8 * 1024;

/// Smallest accepted batch size.
pub const MIN_BATCH_SIZE: usize = 1;

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 100;
