// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use tracing::debug;

use crate::config::MirrorOptions;
use crate::episode::{DownloadContext, derive_filename, download_item, unique_destination};
use crate::error::{DownloadError, SyncError};
use crate::feed::{Item, fetch_items, is_url};
use crate::http::HttpClient;
use crate::ledger::{
    DEFAULT_MARKER_RULES, FsLedger, MarkerContext, SeenLedger, SeenState, check_seen,
    current_marker,
};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// How a single item was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A marker already existed; `migrated_from` names the legacy rule hit
    AlreadyDone { migrated_from: Option<&'static str> },
    /// Bytes were downloaded to `path` and the item marked
    Saved { path: PathBuf, bytes: u64 },
    /// Download suppressed; the item was only marked
    Marked { path: PathBuf },
}

/// Result of a mirror run
#[derive(Debug, Clone, Default)]
pub struct MirrorResult {
    /// Items downloaded and marked
    pub downloaded: usize,
    /// Items marked without downloading
    pub marked: usize,
    /// Items that already had a marker (including migrated ones)
    pub already_done: usize,
    /// Items that failed
    pub failed: usize,
    /// Details of failed items (url, error message)
    pub failed_items: Vec<(String, String)>,
}

/// Handle one item: seen-check, download, mark
///
/// The seen-marker is only written once the download succeeded (or was
/// suppressed), so a failed item is retried on the next run.
pub async fn process_item<C: HttpClient, L: SeenLedger + ?Sized>(
    client: &C,
    ledger: &L,
    item: &Item,
    feed: &str,
    options: &MirrorOptions,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<ItemOutcome, DownloadError> {
    let base = derive_filename(item)?;

    std::fs::create_dir_all(&options.dest_dir).map_err(|e| {
        DownloadError::CreateDirectoryFailed {
            path: options.dest_dir.clone(),
            source: e,
        }
    })?;

    let marker_context = MarkerContext {
        feed,
        guid: &item.guid,
        url: &item.url,
        base: &base,
        max_len: options.max_filename_len,
    };

    match check_seen(ledger, DEFAULT_MARKER_RULES, &marker_context)? {
        SeenState::Unseen => {}
        SeenState::Seen => {
            reporter.report(ProgressEvent::ItemSeen {
                url: item.url.clone(),
            });
            return Ok(ItemOutcome::AlreadyDone {
                migrated_from: None,
            });
        }
        SeenState::Migrated { from } => {
            reporter.report(ProgressEvent::MarkerMigrated {
                url: item.url.clone(),
                rule: from,
            });
            return Ok(ItemOutcome::AlreadyDone {
                migrated_from: Some(from),
            });
        }
    }

    let path = unique_destination(&options.dest_dir, &options.prefix, &base);

    let outcome = if options.skip_download {
        reporter.report(ProgressEvent::DownloadSkipped {
            url: item.url.clone(),
            path: path.clone(),
        });
        ItemOutcome::Marked { path }
    } else {
        let bytes = download_item(client, item, &path, context, reporter).await?;
        ItemOutcome::Saved { path, bytes }
    };

    ledger.mark(&current_marker(&marker_context))?;
    reporter.report(ProgressEvent::Marked {
        url: item.url.clone(),
    });

    Ok(outcome)
}

/// Mirror a feed into `options.dest_dir` using the on-disk seen-ledger
///
/// This is the main entry point for the library. It:
/// 1. Fetches and scans the feed (errors here abort the run)
/// 2. Processes up to `options.limit` items in feed order, one at a time
/// 3. Records per-item failures and carries on
pub async fn mirror_feed<C: HttpClient>(
    client: &C,
    feed: &str,
    options: &MirrorOptions,
    reporter: SharedProgressReporter,
) -> Result<MirrorResult, SyncError> {
    let ledger = FsLedger::new(options.seen_dir());
    mirror_feed_with_ledger(client, &ledger, feed, options, reporter).await
}

/// Like [`mirror_feed`], with a caller-supplied ledger
pub async fn mirror_feed_with_ledger<C: HttpClient, L: SeenLedger + ?Sized>(
    client: &C,
    ledger: &L,
    feed: &str,
    options: &MirrorOptions,
    reporter: SharedProgressReporter,
) -> Result<MirrorResult, SyncError> {
    if is_url(feed) {
        reporter.report(ProgressEvent::FetchingFeed {
            url: feed.to_string(),
        });
    } else {
        reporter.report(ProgressEvent::ReadingFeed {
            path: feed.to_string(),
        });
    }

    let items = fetch_items(client, feed).await?;

    let to_process: Vec<&Item> = match options.limit {
        Some(limit) => items.iter().take(limit).collect(),
        None => items.iter().collect(),
    };
    let total_items = to_process.len();

    reporter.report(ProgressEvent::FeedScanned {
        total_items: items.len(),
        to_process: total_items,
    });

    let mut result = MirrorResult::default();

    for (item_index, item) in to_process.into_iter().enumerate() {
        let context = DownloadContext {
            item_index,
            total_items,
        };

        debug!(url = %item.url, guid = %item.guid, "processing item");
        match process_item(client, ledger, item, feed, options, &context, &reporter).await {
            Ok(ItemOutcome::AlreadyDone { .. }) => result.already_done += 1,
            Ok(ItemOutcome::Saved { .. }) => result.downloaded += 1,
            Ok(ItemOutcome::Marked { .. }) => result.marked += 1,
            Err(e) => {
                reporter.report(ProgressEvent::ItemFailed {
                    url: item.url.clone(),
                    error: e.to_string(),
                });
                result.failed += 1;
                result.failed_items.push((item.url.clone(), e.to_string()));
            }
        }
    }

    reporter.report(ProgressEvent::SyncCompleted {
        downloaded_count: result.downloaded,
        marked_count: result.marked,
        already_done_count: result.already_done,
        failed_count: result.failed,
    });

    Ok(result)
}
