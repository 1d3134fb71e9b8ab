// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

/// Subdirectory of the destination directory holding seen-markers
pub const SEEN_SUBDIR: &str = ".seen";

/// Maximum length in bytes of a single filename or marker path component
pub const MAX_FILENAME_LEN: usize = 255;

/// Default destination directory: `$HOME/temp/podcasts`
///
/// Falls back to a relative `temp/podcasts` when `HOME` is unset.
pub fn default_dest_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join("temp")
        .join("podcasts")
}

/// Options for a mirror run
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Directory receiving downloaded files (created if absent)
    pub dest_dir: PathBuf,
    /// Prepended to every derived filename; not part of item identity
    pub prefix: String,
    /// Mark items as done without downloading them
    pub skip_download: bool,
    /// Maximum number of items to process (None = all)
    pub limit: Option<usize>,
    /// Marker subdirectory below `dest_dir`
    pub seen_subdir: String,
    /// Marker path components are truncated to this many bytes
    pub max_filename_len: usize,
}

impl MirrorOptions {
    /// Options for the given destination with everything else defaulted
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            prefix: String::new(),
            skip_download: false,
            limit: None,
            seen_subdir: SEEN_SUBDIR.to_string(),
            max_filename_len: MAX_FILENAME_LEN,
        }
    }

    /// Root of the seen-marker tree
    pub fn seen_dir(&self) -> PathBuf {
        self.dest_dir.join(&self.seen_subdir)
    }
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self::new(default_dest_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dest_dir_ends_in_temp_podcasts() {
        let dir = default_dest_dir();
        assert!(dir.ends_with("temp/podcasts"));
    }

    #[test]
    fn new_options_use_named_constants() {
        let options = MirrorOptions::new("/tmp/mirror");

        assert_eq!(options.seen_subdir, ".seen");
        assert_eq!(options.max_filename_len, 255);
        assert!(options.prefix.is_empty());
        assert!(!options.skip_download);
        assert!(options.limit.is_none());
        assert_eq!(options.seen_dir(), PathBuf::from("/tmp/mirror/.seen"));
    }
}
