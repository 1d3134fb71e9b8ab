// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

/// Events emitted during a mirror run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from a URL
    FetchingFeed { url: String },

    /// Feed is being read from a local file
    ReadingFeed { path: String },

    /// Feed has been scanned
    FeedScanned {
        /// Items with an enclosure found in the feed
        total_items: usize,
        /// Items this run will process after the limit
        to_process: usize,
    },

    /// Item already has a seen-marker
    ItemSeen { url: String },

    /// Item was found under a legacy marker and migrated
    MarkerMigrated { url: String, rule: &'static str },

    /// A download is starting
    DownloadStarting {
        url: String,
        path: PathBuf,
        /// Index of this item in the processing order
        item_index: usize,
        /// Number of items this run will process
        total_items: usize,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        url: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted { url: String, bytes_downloaded: u64 },

    /// Item marked as done without downloading
    DownloadSkipped { url: String, path: PathBuf },

    /// Seen-marker written for a finished item
    Marked { url: String },

    /// Processing an item failed
    ItemFailed { url: String, error: String },

    /// Mirror run completed
    SyncCompleted {
        downloaded_count: usize,
        marked_count: usize,
        already_done_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a mirror run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;
        let url = "https://example.com/ep1.mp3".to_string();

        reporter.report(ProgressEvent::FetchingFeed {
            url: "https://example.com/feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::ReadingFeed {
            path: "feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::FeedScanned {
            total_items: 10,
            to_process: 5,
        });
        reporter.report(ProgressEvent::ItemSeen { url: url.clone() });
        reporter.report(ProgressEvent::MarkerMigrated {
            url: url.clone(),
            rule: "legacy-url",
        });
        reporter.report(ProgressEvent::DownloadStarting {
            url: url.clone(),
            path: PathBuf::from("/tmp/ep1.mp3"),
            item_index: 0,
            total_items: 5,
            content_length: Some(1024),
        });
        reporter.report(ProgressEvent::DownloadProgress {
            url: url.clone(),
            bytes_downloaded: 512,
            total_bytes: Some(1024),
        });
        reporter.report(ProgressEvent::DownloadCompleted {
            url: url.clone(),
            bytes_downloaded: 1024,
        });
        reporter.report(ProgressEvent::DownloadSkipped {
            url: url.clone(),
            path: PathBuf::from("/tmp/ep1.mp3"),
        });
        reporter.report(ProgressEvent::Marked { url: url.clone() });
        reporter.report(ProgressEvent::ItemFailed {
            url,
            error: "Connection timeout".to_string(),
        });
        reporter.report(ProgressEvent::SyncCompleted {
            downloaded_count: 4,
            marked_count: 0,
            already_done_count: 5,
            failed_count: 1,
        });
    }
}
