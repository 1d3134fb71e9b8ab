pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod ledger;
pub mod progress;
pub mod sync;

// Re-export main types for convenience
pub use config::{MAX_FILENAME_LEN, MirrorOptions, SEEN_SUBDIR, default_dest_dir};
pub use episode::{derive_filename, unique_destination};
pub use error::{DownloadError, FeedError, LedgerError, NamingError, SyncError};
pub use feed::{Item, fetch_items, is_url, scan_items};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use ledger::{FsLedger, MarkerKey, MarkerRule, MemoryLedger, SeenLedger};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use sync::{ItemOutcome, MirrorResult, mirror_feed, mirror_feed_with_ledger, process_item};
