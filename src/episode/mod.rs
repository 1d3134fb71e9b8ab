mod download;
mod filename;

pub use download::{DownloadContext, download_item};
pub use filename::{derive_filename, unique_destination};
