//! ObjectStore trait definition
//!
//! This trait is the contract the client facade consumes from a storage
//! backend: paginated listing by prefix, single-object put/get/delete and
//! signed read URLs. Transport, signing and wire-level retry live behind it.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;

/// Streaming object body
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// One raw record returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Full object key
    pub key: String,

    /// Content hash (ETag)
    pub hash: String,

    /// Size in bytes
    pub size: i64,

    /// Upload time, seconds since the Unix epoch
    pub put_time: i64,

    /// Content type, empty when the backend does not report it
    pub mime_type: String,

    /// Storage class tag: 0 standard, 1 infrequent access, 2 archive, 3 deep archive
    pub type_tag: i32,
}

impl ListEntry {
    /// Create an entry with only a key and size set
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            hash: String::new(),
            size,
            put_time: 0,
            mime_type: String::new(),
            type_tag: 0,
        }
    }

    /// Human-readable size
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size.max(0) as u64, humansize::BINARY)
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPage {
    /// Entries on this page, in service order
    pub entries: Vec<ListEntry>,

    /// Cursor for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,

    /// Whether more pages follow
    pub has_more: bool,
}

/// Result of a single successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Destination key
    pub key: String,

    /// Content hash reported by the service
    pub hash: String,

    /// Uploaded size in bytes
    pub size: i64,

    /// Destination bucket
    pub bucket: String,

    /// Caller-supplied name stored alongside the object
    pub name: String,
}

/// Trait for prefix-addressable object storage backends
///
/// Implemented by the S3 adapter and by [`crate::memory::MemoryStore`];
/// mocked in unit tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this store is scoped to
    fn bucket(&self) -> &str;

    /// Fetch one page of keys starting with `prefix`
    ///
    /// `cursor` is `None` for the first page.
    async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<ListPage>;

    /// Upload `size` bytes from `body` to `key`
    async fn put(&self, key: &str, name: &str, body: ByteReader, size: u64)
        -> Result<UploadResult>;

    /// Delete a single key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Open a reader on `key`, starting at byte `offset`
    async fn get(&self, key: &str, offset: u64) -> Result<ByteReader>;

    /// Build a read URL for `key` valid for `expires_in`
    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String>;
}
