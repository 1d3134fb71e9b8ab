// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::MAX_FILENAME_LEN;
use crate::error::NamingError;
use crate::feed::Item;

/// Simplecast (served through podtrac redirects) names every file
/// `default.mp3`; the episode UUID in the path tells them apart.
static EPISODE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/episodes/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})/")
        .expect("episode id pattern is valid")
});

/// Extension given to names built from a title or episode id
const EPISODE_EXTENSION: &str = ".mp3";

/// Last path segment of a URL, ignoring query string and fragment
fn url_basename(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// Make a title usable as a single path segment
fn title_segment(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c == '/' || c == '\0' { '-' } else { c })
        .collect();
    truncate_to_bytes(&cleaned, MAX_FILENAME_LEN - EPISODE_EXTENSION.len()).to_string()
}

fn truncate_to_bytes(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Derive the base filename (without prefix) for an item
pub fn derive_filename(item: &Item) -> Result<String, NamingError> {
    let mut base = url_basename(&item.url).to_string();

    if let Some(caps) = EPISODE_ID.captures(&item.url) {
        let title = title_segment(item.title.trim());
        base = if title.is_empty() {
            format!("{}{EPISODE_EXTENSION}", &caps[1])
        } else {
            format!("{title}{EPISODE_EXTENSION}")
        };
    }

    match base.as_str() {
        "" => Err(NamingError::Empty {
            url: item.url.clone(),
        }),
        "." | ".." => Err(NamingError::Reserved {
            url: item.url.clone(),
            name: base,
        }),
        _ => Ok(base),
    }
}

/// Split `name` into stem and extension (extension keeps its dot)
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Join the name parts, shortening `stem` so the whole name stays within
/// `MAX_FILENAME_LEN` bytes
fn fit_name(prefix: &str, stem: &str, suffix: &str, ext: &str) -> String {
    let room = MAX_FILENAME_LEN.saturating_sub(prefix.len() + suffix.len() + ext.len());
    format!("{prefix}{}{suffix}{ext}", truncate_to_bytes(stem, room))
}

/// First path in `dir` not already taken: `prefix+base`, then
/// `prefix+stem+N+ext` for N = 0, 1, 2, ...
///
/// The stem is shortened when prefix, counter and extension would push the
/// name past `MAX_FILENAME_LEN`.
pub fn unique_destination(dir: &Path, prefix: &str, base: &str) -> PathBuf {
    let (stem, ext) = split_extension(base);
    let candidate = dir.join(fit_name(prefix, stem, "", ext));
    if !candidate.exists() {
        return candidate;
    }

    (0u64..)
        .map(|n| dir.join(fit_name(prefix, stem, &n.to_string(), ext)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
