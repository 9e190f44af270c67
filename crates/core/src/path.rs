//! Key and path helpers
//!
//! Keys live in a flat namespace where `/` is only a convention. These
//! helpers turn keys into segments and map local files onto keys.

use std::path::Path;

use crate::error::{Error, Result};

/// Split a key or prefix into its non-empty `/`-separated segments
///
/// Leading, trailing and repeated slashes never produce a segment, so
/// `"/a//b/"` and `"a/b"` both yield `["a", "b"]`.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Last segment of a key (`"a/b/c.txt"` -> `"c.txt"`)
///
/// Returns `None` for keys with no segments.
pub fn base_name(key: &str) -> Option<&str> {
    split_segments(key).last().copied()
}

/// Ensure a key starts with `/`
pub fn rooted_key(key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{key}")
    }
}

/// Destination key for a local file: its path with `/` separators
pub fn local_key(path: &Path) -> Result<String> {
    let key = path.to_string_lossy().replace('\\', "/");
    if split_segments(&key).is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{}' does not name a file",
            path.display()
        )));
    }
    Ok(key)
}
