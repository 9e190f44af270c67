//! One-level directory view over a flat key space
//!
//! The backend has no directories. A "directory" is any key segment that has
//! further segments below it, so listing a prefix and keeping only the first
//! segment past the prefix reproduces `ls` over the namespace.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::path::split_segments;
use crate::traits::ListEntry;

/// One immediate child of a listed prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Full key (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Content hash (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Size in bytes (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// Upload time (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_time: Option<i64>,

    /// Content type (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Storage class tag (files only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<i32>,

    /// Whether this is a synthesized directory node
    pub is_dir: bool,

    /// Segment name relative to the listed prefix, never empty
    pub name: String,
}

impl DirectoryEntry {
    /// A file child carrying the metadata of its listing entry
    pub fn file(name: impl Into<String>, entry: &ListEntry) -> Self {
        Self {
            key: Some(entry.key.clone()),
            hash: Some(entry.hash.clone()),
            size: Some(entry.size),
            put_time: Some(entry.put_time),
            mime_type: Some(entry.mime_type.clone()),
            type_tag: Some(entry.type_tag),
            is_dir: false,
            name: name.into(),
        }
    }

    /// A directory node; descendants own the metadata, so none is kept
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            key: None,
            hash: None,
            size: None,
            put_time: None,
            mime_type: None,
            type_tag: None,
            is_dir: true,
            name: name.into(),
        }
    }

    /// Human-readable size, empty for directories
    pub fn size_human(&self) -> String {
        self.size
            .map(|s| humansize::format_size(s.max(0) as u64, humansize::BINARY))
            .unwrap_or_default()
    }
}

/// Name of the immediate child of `prefix` that `key` belongs to
///
/// Returns the child's name and whether it is a directory, or `None` when
/// `key` is not strictly below `prefix` segment-wise.
pub fn child_name<'k>(prefix: &str, key: &'k str) -> Option<(&'k str, bool)> {
    if !key.starts_with(prefix) {
        return None;
    }

    let parent = split_segments(prefix);
    let segments = split_segments(key);

    if segments.len() <= parent.len() {
        return None;
    }
    if parent.iter().zip(&segments).any(|(p, s)| p != s) {
        return None;
    }

    let extra = segments.len() - parent.len();
    Some((segments[parent.len()], extra > 1))
}

/// Project raw listing entries onto the immediate children of `prefix`
///
/// Output keeps first-seen order and holds one entry per child name. When a
/// name appears more than once, the first entry wins, so the result depends
/// on the order the service lists keys in.
pub fn project<'a, I>(prefix: &str, entries: I) -> Vec<DirectoryEntry>
where
    I: IntoIterator<Item = &'a ListEntry>,
{
    let mut seen = HashSet::new();
    let mut children = Vec::new();

    for entry in entries {
        let Some((name, is_dir)) = child_name(prefix, &entry.key) else {
            continue;
        };
        if !seen.insert(name.to_string()) {
            continue;
        }

        children.push(if is_dir {
            DirectoryEntry::dir(name)
        } else {
            DirectoryEntry::file(name, entry)
        });
    }

    children
}
