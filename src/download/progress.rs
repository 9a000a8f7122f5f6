//! Progress reporting for batched downloads.

use indicatif::{ProgressBar, ProgressStyle};

use super::FetchKind;

/// Receives progress events from the scheduler.
///
/// `advance` is called once per finished item (success or failure), so the
/// position is monotonic and reaches the total exactly once.
pub trait ProgressSink: Send + Sync {
    /// Called once before the first batch with the number of items.
    fn start(&self, _total: u64) {}

    /// Called once per finished item.
    fn advance(&self, delta: u64);

    /// Called once after the last batch.
    fn finish(&self) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _delta: u64) {}
}

impl ProgressSink for ProgressBar {
    fn start(&self, total: u64) {
        self.set_length(total);
        self.set_position(0);
    }

    fn advance(&self, delta: u64) {
        self.inc(delta);
    }

    fn finish(&self) {
        ProgressBar::finish(self);
    }
}

/// Builds the terminal progress bar used by the CLI.
#[must_use]
pub fn download_progress_bar(kind: FetchKind) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(format!("Downloading {kind}s"));
    bar
}
