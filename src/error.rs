// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when fetching or scanning a feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Stream error while reading feed {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read feed file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse feed at byte {position}: {source}")]
    ParseFailed {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
}

/// Errors that can occur when deriving a filename for an item
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("Unable to derive a filename from {url}")]
    Empty { url: String },

    #[error("Derived filename '{name}' from {url} is not usable")]
    Reserved { url: String, name: String },
}

/// Errors raised by the seen-ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to create marker directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create marker {path}: {source}")]
    CreateMarkerFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to check marker {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while processing a single item
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Top-level errors for a mirror run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}
