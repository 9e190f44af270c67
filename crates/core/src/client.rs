//! Client facade
//!
//! [`StoreClient`] bundles a backend with its transfer settings and exposes
//! every operation the CLI needs: directory listing, tree push, prefix
//! delete and the single-object helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::config::TransferConfig;
use crate::delete::{delete_all, OpOutcome};
use crate::error::{Error, Result};
use crate::list::list_all;
use crate::path::{base_name, local_key, rooted_key};
use crate::projection::{project, DirectoryEntry};
use crate::traits::{ByteReader, ListEntry, ObjectStore, UploadResult};
use crate::upload::{upload_file, TreeUploadReport, TreeUploader, UploadOptions};

/// Bucket-scoped client over any [`ObjectStore`]
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
}

impl StoreClient {
    /// Create a client with default transfer settings
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::from_parts(store, TransferConfig::default())
    }

    pub fn from_parts(store: Arc<dyn ObjectStore>, transfer: TransferConfig) -> Self {
        Self { store, transfer }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub fn transfer(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Shared handle to the backend
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// A tree uploader configured from this client's transfer settings
    pub fn uploader(&self) -> TreeUploader {
        TreeUploader::new(Arc::clone(&self.store), UploadOptions::from(&self.transfer))
    }

    /// Every raw entry under `prefix`
    pub async fn list_all(&self, prefix: &str) -> Result<Vec<ListEntry>> {
        list_all(
            self.store.as_ref(),
            prefix,
            self.transfer.page_size,
            self.transfer.error_mode,
        )
        .await
    }

    /// Immediate children of `prefix`, directories collapsed
    pub async fn list_directory(&self, prefix: &str) -> Result<Vec<DirectoryEntry>> {
        let entries = self.list_all(prefix).await?;
        Ok(project(prefix, &entries))
    }

    /// Upload every file under `root`
    pub async fn push_tree(&self, root: &Path) -> Result<Vec<UploadResult>> {
        self.uploader().push_tree(root).await
    }

    /// Upload every file under `root`, reporting each failure
    pub async fn push_tree_report(&self, root: &Path) -> TreeUploadReport {
        self.uploader().push_tree_report(root).await
    }

    /// Delete every key under each of `prefixes`
    pub async fn delete_by_prefix<S: AsRef<str>>(&self, prefixes: &[S]) -> Result<Vec<OpOutcome>> {
        delete_all(
            self.store.as_ref(),
            prefixes,
            self.transfer.page_size,
            self.transfer.error_mode,
        )
        .await
    }

    /// Upload `size` bytes from `body` to `key`
    pub async fn put(&self, key: &str, body: ByteReader, size: u64) -> Result<UploadResult> {
        self.store.put(key, key, body, size).await
    }

    /// Upload an in-memory buffer
    pub async fn put_bytes(&self, key: &str, data: Vec<u8>) -> Result<UploadResult> {
        let size = data.len() as u64;
        self.put(key, Box::pin(std::io::Cursor::new(data)), size).await
    }

    /// Upload one local file under its own path
    pub async fn put_file(&self, path: &Path) -> Result<UploadResult> {
        let key = self.key_for(path)?;
        upload_file(self.store.as_ref(), path, &key).await
    }

    /// Stream `key` starting at `offset`
    pub async fn get(&self, key: &str, offset: u64) -> Result<ByteReader> {
        self.store.get(key, offset).await
    }

    /// Read the whole object into memory
    pub async fn pull(&self, key: &str) -> Result<Vec<u8>> {
        let mut body = self.get(key, 0).await?;
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Download `key` into `dst_dir`, keeping its base name
    ///
    /// Creates `dst_dir` when missing and returns the written path.
    pub async fn pull_to(&self, key: &str, dst_dir: &Path) -> Result<PathBuf> {
        let name = base_name(key)
            .ok_or_else(|| Error::InvalidPath(format!("'{key}' has no file name")))?;

        tokio::fs::create_dir_all(dst_dir).await?;
        let target = dst_dir.join(name);

        let mut body = self.get(key, 0).await?;
        let mut file = tokio::fs::File::create(&target).await?;
        let written = tokio::io::copy(&mut body, &mut file).await?;
        debug!(key, path = %target.display(), bytes = written, "Downloaded");

        Ok(target)
    }

    /// Signed read URL for `key`, valid for `ttl`
    pub async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.store.signed_url(key, ttl).await
    }

    /// Signed read URL with the configured lifetime
    pub async fn url_for(&self, key: &str) -> Result<String> {
        self.signed_url(key, self.transfer.url_ttl()).await
    }

    fn key_for(&self, path: &Path) -> Result<String> {
        let key = local_key(path)?;
        Ok(if self.transfer.rooted_keys {
            rooted_key(&key)
        } else {
            key
        })
    }
}
