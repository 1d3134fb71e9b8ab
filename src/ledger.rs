// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seen-ledger: existence of a marker means "already handled".
//!
//! Markers are addressed by a [`MarkerKey`], a list of already-escaped path
//! segments. [`FsLedger`] stores them as zero-byte files below the seen
//! directory; [`MemoryLedger`] keeps them in a set.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use crate::error::LedgerError;

/// Bytes left unescaped in a path segment: RFC 3986 unreserved plus
/// `$ & + = : @`. `/`, `,`, `;` and `?` are always escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Escape a string so it is usable as one path segment, truncated to
/// `max_len` bytes
pub fn escape_segment(value: &str, max_len: usize) -> String {
    let mut escaped = utf8_percent_encode(value, SEGMENT).to_string();
    // Escaped output is pure ASCII, so any byte index is a char boundary
    escaped.truncate(max_len);
    escaped
}

/// Relative location of a seen-marker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerKey(Vec<String>);

impl MarkerKey {
    /// Build a key from already-escaped segments
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Path of this key below `root`
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.iter().fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Persistent record of handled items
pub trait SeenLedger: Send + Sync {
    /// Whether a marker exists for `key`
    fn exists(&self, key: &MarkerKey) -> Result<bool, LedgerError>;

    /// Create the marker for `key`; creating an existing marker is a no-op
    fn mark(&self, key: &MarkerKey) -> Result<(), LedgerError>;
}

/// Ledger backed by zero-byte files below a root directory
#[derive(Debug, Clone)]
pub struct FsLedger {
    root: PathBuf,
}

impl FsLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SeenLedger for FsLedger {
    fn exists(&self, key: &MarkerKey) -> Result<bool, LedgerError> {
        let path = key.to_path(&self.root);
        path.try_exists()
            .map_err(|e| LedgerError::StatFailed { path, source: e })
    }

    fn mark(&self, key: &MarkerKey) -> Result<(), LedgerError> {
        let path = key.to_path(&self.root);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        debug!(marker = %path.display(), "touching seen-marker");
        std::fs::File::create(&path)
            .map(drop)
            .map_err(|e| LedgerError::CreateMarkerFailed { path, source: e })
    }
}

/// Ledger held in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryLedger {
    keys: Mutex<HashSet<MarkerKey>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all marked keys
    pub fn keys(&self) -> Vec<MarkerKey> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl SeenLedger for MemoryLedger {
    fn exists(&self, key: &MarkerKey) -> Result<bool, LedgerError> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.contains(key))
    }

    fn mark(&self, key: &MarkerKey) -> Result<(), LedgerError> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        Ok(())
    }
}

/// Identity of one item as seen by the marker rules
#[derive(Debug, Clone, Copy)]
pub struct MarkerContext<'a> {
    pub feed: &'a str,
    pub guid: &'a str,
    pub url: &'a str,
    /// Derived base filename, without prefix
    pub base: &'a str,
    pub max_len: usize,
}

/// One marker location and whether a hit there must be migrated forward
#[derive(Debug, Clone, Copy)]
pub struct MarkerRule {
    pub name: &'static str,
    pub build: fn(&MarkerContext<'_>) -> MarkerKey,
    pub write_forward: bool,
}

/// Current format: `<feed>/<guid>`
pub fn current_marker(ctx: &MarkerContext<'_>) -> MarkerKey {
    MarkerKey::new(vec![
        escape_segment(ctx.feed, ctx.max_len),
        escape_segment(ctx.guid, ctx.max_len),
    ])
}

fn url_marker(ctx: &MarkerContext<'_>) -> MarkerKey {
    MarkerKey::new(vec![escape_segment(ctx.url, ctx.max_len)])
}

fn basename_marker(ctx: &MarkerContext<'_>) -> MarkerKey {
    MarkerKey::new(vec![escape_segment(ctx.base, ctx.max_len)])
}

/// Unescaped base filename, as older releases wrote it. Names that cannot
/// be a single segment fall back to the escaped form.
fn raw_basename_marker(ctx: &MarkerContext<'_>) -> MarkerKey {
    if ctx.base.contains('/') || ctx.base.len() > ctx.max_len {
        return basename_marker(ctx);
    }
    MarkerKey::new(vec![ctx.base.to_string()])
}

/// Marker locations, checked in order. The first rule is the current format.
pub const DEFAULT_MARKER_RULES: &[MarkerRule] = &[
    MarkerRule {
        name: "feed-guid",
        build: current_marker,
        write_forward: false,
    },
    MarkerRule {
        name: "legacy-url",
        build: url_marker,
        write_forward: true,
    },
    MarkerRule {
        name: "legacy-basename",
        build: basename_marker,
        write_forward: true,
    },
    MarkerRule {
        name: "legacy-raw-basename",
        build: raw_basename_marker,
        write_forward: true,
    },
];

/// Result of consulting the ledger for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenState {
    /// No marker anywhere
    Unseen,
    /// Found under the current format
    Seen,
    /// Found under a legacy rule; the current marker was created
    Migrated { from: &'static str },
}

/// Evaluate `rules` in order, migrating legacy hits forward
pub fn check_seen<L: SeenLedger + ?Sized>(
    ledger: &L,
    rules: &[MarkerRule],
    ctx: &MarkerContext<'_>,
) -> Result<SeenState, LedgerError> {
    let current = current_marker(ctx);

    for rule in rules {
        let key = (rule.build)(ctx);
        if !ledger.exists(&key)? {
            continue;
        }

        if rule.write_forward && !ledger.exists(&current)? {
            debug!(rule = rule.name, from = %key, to = %current, "migrating seen-marker");
            ledger.mark(&current)?;
            return Ok(SeenState::Migrated { from: rule.name });
        }
        return Ok(SeenState::Seen);
    }

    Ok(SeenState::Unseen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context<'a>(url: &'a str, base: &'a str) -> MarkerContext<'a> {
        MarkerContext {
            feed: "https://example.com/feed.xml",
            guid: "ep1-guid",
            url,
            base,
            max_len: 255,
        }
    }

    #[test]
    fn escape_encodes_slashes_and_spaces() {
        assert_eq!(
            escape_segment("https://example.com/a b.mp3?x=1", 255),
            "https:%2F%2Fexample.com%2Fa%20b.mp3%3Fx=1"
        );
    }

    #[test]
    fn escape_keeps_unreserved_characters() {
        assert_eq!(escape_segment("Ep-1_final.v2~", 255), "Ep-1_final.v2~");
    }

    #[test]
    fn escape_truncates_to_max_len() {
        let long = "a/".repeat(300);
        let escaped = escape_segment(&long, 255);

        assert_eq!(escaped.len(), 255);
        assert!(!escaped.contains('/'));
    }

    #[test]
    fn escape_handles_multibyte_input() {
        assert_eq!(escape_segment("Café", 255), "Caf%C3%A9");
    }

    #[test]
    fn marker_key_maps_to_nested_path() {
        let key = MarkerKey::new(vec!["feed".to_string(), "guid".to_string()]);

        assert_eq!(key.to_path(Path::new("/dest/.seen")), PathBuf::from("/dest/.seen/feed/guid"));
        assert_eq!(key.to_string(), "feed/guid");
    }

    #[test]
    fn current_marker_is_scoped_by_feed() {
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");
        let key = current_marker(&ctx);

        assert_eq!(
            key.segments(),
            &["https:%2F%2Fexample.com%2Ffeed.xml".to_string(), "ep1-guid".to_string()]
        );
    }

    #[test]
    fn fs_ledger_marks_and_detects() {
        let dir = tempdir().unwrap();
        let ledger = FsLedger::new(dir.path().join(".seen"));
        let key = MarkerKey::new(vec!["feed".to_string(), "guid".to_string()]);

        assert!(!ledger.exists(&key).unwrap());
        ledger.mark(&key).unwrap();
        assert!(ledger.exists(&key).unwrap());

        let marker = dir.path().join(".seen/feed/guid");
        assert_eq!(std::fs::metadata(marker).unwrap().len(), 0);
    }

    #[test]
    fn fs_ledger_mark_is_idempotent() {
        let dir = tempdir().unwrap();
        let ledger = FsLedger::new(dir.path());
        let key = MarkerKey::new(vec!["only".to_string()]);

        ledger.mark(&key).unwrap();
        ledger.mark(&key).unwrap();
        assert!(ledger.exists(&key).unwrap());
    }

    #[test]
    fn check_seen_reports_unseen_items() {
        let ledger = MemoryLedger::new();
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");

        let state = check_seen(&ledger, DEFAULT_MARKER_RULES, &ctx).unwrap();

        assert_eq!(state, SeenState::Unseen);
        assert!(ledger.keys().is_empty());
    }

    #[test]
    fn check_seen_finds_current_marker_without_migrating() {
        let ledger = MemoryLedger::new();
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");
        ledger.mark(&current_marker(&ctx)).unwrap();

        let state = check_seen(&ledger, DEFAULT_MARKER_RULES, &ctx).unwrap();

        assert_eq!(state, SeenState::Seen);
        assert_eq!(ledger.keys().len(), 1);
    }

    #[test]
    fn check_seen_migrates_legacy_url_marker() {
        let ledger = MemoryLedger::new();
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");
        let legacy = MarkerKey::new(vec![escape_segment(ctx.url, 255)]);
        ledger.mark(&legacy).unwrap();

        let state = check_seen(&ledger, DEFAULT_MARKER_RULES, &ctx).unwrap();

        assert_eq!(state, SeenState::Migrated { from: "legacy-url" });
        assert!(ledger.exists(&current_marker(&ctx)).unwrap());
        // Legacy marker is kept
        assert!(ledger.exists(&legacy).unwrap());
    }

    #[test]
    fn check_seen_migrates_legacy_basename_marker() {
        let dir = tempdir().unwrap();
        let ledger = FsLedger::new(dir.path());
        std::fs::write(dir.path().join("ep1.mp3"), b"").unwrap();
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");

        let state = check_seen(&ledger, DEFAULT_MARKER_RULES, &ctx).unwrap();

        assert_eq!(state, SeenState::Migrated { from: "legacy-basename" });
        assert!(
            dir.path()
                .join("https:%2F%2Fexample.com%2Ffeed.xml")
                .join("ep1-guid")
                .exists()
        );
    }

    #[test]
    fn check_seen_respects_custom_rule_lists() {
        let ledger = MemoryLedger::new();
        let ctx = context("https://example.com/ep1.mp3", "ep1.mp3");
        ledger
            .mark(&MarkerKey::new(vec![escape_segment(ctx.url, 255)]))
            .unwrap();

        // Without the legacy rules, a URL marker means nothing
        let state = check_seen(&ledger, &DEFAULT_MARKER_RULES[..1], &ctx).unwrap();
        assert_eq!(state, SeenState::Unseen);
    }

    #[test]
    fn escape_encodes_commas_and_semicolons() {
        assert_eq!(
            escape_segment("https://x.com/a,b;c.mp3", 255),
            "https:%2F%2Fx.com%2Fa%2Cb%3Bc.mp3"
        );
        assert_eq!(escape_segment("a$b&c+d=e@f", 255), "a$b&c+d=e@f");
    }

    #[test]
    fn check_seen_migrates_raw_basename_marker() {
        let dir = tempdir().unwrap();
        let ledger = FsLedger::new(dir.path());
        std::fs::write(dir.path().join("Ep 12: Foo.mp3"), b"").unwrap();
        let ctx = context("https://example.com/ep12.mp3", "Ep 12: Foo.mp3");

        let state = check_seen(&ledger, DEFAULT_MARKER_RULES, &ctx).unwrap();

        assert_eq!(state, SeenState::Migrated { from: "legacy-raw-basename" });
        assert!(ledger.exists(&current_marker(&ctx)).unwrap());
    }

    #[test]
    fn raw_basename_marker_falls_back_when_too_long() {
        let base = "a".repeat(300);
        let ctx = context("https://example.com/x.mp3", &base);

        assert_eq!(raw_basename_marker(&ctx), basename_marker(&ctx));
        assert_eq!(raw_basename_marker(&ctx).segments()[0].len(), 255);
    }

    #[test]
    fn memory_ledger_survives_poisoned_lock() {
        let ledger = std::sync::Arc::new(MemoryLedger::new());
        let key = MarkerKey::new(vec!["feed".to_string(), "guid".to_string()]);
        ledger.mark(&key).unwrap();

        let poisoner = std::sync::Arc::clone(&ledger);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.keys.lock().unwrap();
            panic!("poison the ledger lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(ledger.keys.is_poisoned());

        let other = MarkerKey::new(vec!["other".to_string()]);
        assert!(ledger.exists(&key).unwrap());
        ledger.mark(&other).unwrap();
        assert!(ledger.exists(&other).unwrap());
        assert_eq!(ledger.keys().len(), 2);
    }
}
