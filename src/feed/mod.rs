mod fetch;
mod scan;

pub use fetch::{fetch_feed_bytes, fetch_items, is_url, read_feed_file};
pub use scan::{Item, scan_items};
