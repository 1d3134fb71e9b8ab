// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::feed::Item;
use crate::http::{ByteStream, HttpClient};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Position of an item within the current run, for progress reporting
#[derive(Debug, Clone, Copy)]
pub struct DownloadContext {
    /// Index of this item in the processing order
    pub item_index: usize,
    /// Number of items this run will process
    pub total_items: usize,
}

/// Download an item's enclosure to `output_path`
///
/// The file is created fresh and the body copied verbatim. On failure a
/// partially written file is removed. Returns the number of bytes written.
pub async fn download_item<C: HttpClient + ?Sized>(
    client: &C,
    item: &Item,
    output_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = item.url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        url: url.to_string(),
        path: output_path.to_path_buf(),
        item_index: context.item_index,
        total_items: context.total_items,
        content_length: response.content_length,
    });

    let mut file =
        File::create(output_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

    let result = copy_body(
        &mut file,
        response.body,
        url,
        output_path,
        response.content_length,
        reporter,
    )
    .await;
    drop(file);

    if result.is_err() {
        let _ = tokio::fs::remove_file(output_path).await;
    }
    let bytes_downloaded = result?;

    reporter.report(ProgressEvent::DownloadCompleted {
        url: url.to_string(),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

async fn copy_body(
    file: &mut File,
    mut stream: ByteStream,
    url: &str,
    output_path: &Path,
    total_bytes: Option<u64>,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let mut bytes_downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            url: url.to_string(),
            bytes_downloaded,
            total_bytes,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(bytes_downloaded)
}
