// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use futures::StreamExt;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::scan::{Item, scan_items};

/// Fetch raw feed bytes from a URL (without scanning)
///
/// Any non-2xx status is a fetch failure.
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, FeedError> {
    let response = client
        .get_stream(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let mut bytes = Vec::new();
    let mut stream = response.body;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FeedError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Read raw feed bytes from a local file (without scanning)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Fetch a feed from a URL or local file and scan it into items
pub async fn fetch_items<C: HttpClient>(client: &C, source: &str) -> Result<Vec<Item>, FeedError> {
    let bytes = if is_url(source) {
        fetch_feed_bytes(client, source).await?
    } else {
        read_feed_file(Path::new(source))?
    };
    scan_items(bytes.as_slice())
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
