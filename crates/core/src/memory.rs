//! In-memory object store
//!
//! A complete [`ObjectStore`] backed by a sorted map, so listings come back in
//! lexicographic key order like a real bucket. Used for offline runs and for
//! tests, which can inject listing, upload and delete failures.

use std::collections::{BTreeMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::traits::{ByteReader, ListEntry, ListPage, ObjectStore, UploadResult};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    hash: String,
    put_time: i64,
    name: String,
}

#[derive(Debug, Default)]
struct Faults {
    fail_listing_after: Option<usize>,
    fail_put: HashSet<String>,
    fail_delete: HashSet<String>,
    put_delay: Option<Duration>,
}

/// Object store kept entirely in process memory
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    max_page_size: usize,
    list_calls: AtomicUsize,
    in_flight_puts: AtomicUsize,
    max_in_flight_puts: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn content_hash(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl MemoryStore {
    /// Create an empty store for `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            max_page_size: usize::MAX,
            list_calls: AtomicUsize::new(0),
            in_flight_puts: AtomicUsize::new(0),
            max_in_flight_puts: AtomicUsize::new(0),
        }
    }

    /// Cap the number of entries returned per page regardless of request
    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size.max(1);
        self
    }

    /// Fail every listing call after `pages` successful ones
    pub fn fail_listing_after(self, pages: usize) -> Self {
        lock(&self.faults).fail_listing_after = Some(pages);
        self
    }

    /// Make uploads to `key` fail
    pub fn fail_put_for(self, key: impl Into<String>) -> Self {
        lock(&self.faults).fail_put.insert(key.into());
        self
    }

    /// Make deletes of `key` fail
    pub fn fail_delete_for(self, key: impl Into<String>) -> Self {
        lock(&self.faults).fail_delete.insert(key.into());
        self
    }

    /// Hold every upload for `delay` before storing it
    pub fn with_put_delay(self, delay: Duration) -> Self {
        lock(&self.faults).put_delay = Some(delay);
        self
    }

    /// Store an object directly
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        let object = StoredObject {
            hash: content_hash(&data),
            data,
            put_time: jiff::Timestamp::now().as_second(),
            name: key.to_string(),
        };
        lock(&self.objects).insert(key.to_string(), object);
    }

    /// All keys, in order
    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    /// Whether `key` exists
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    /// Stored bytes of `key`
    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).map(|o| o.data.clone())
    }

    /// Name recorded with `key` at upload time
    pub fn name_of(&self, key: &str) -> Option<String> {
        lock(&self.objects).get(key).map(|o| o.name.clone())
    }

    /// Number of `list_page` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of uploads observed in flight at once
    pub fn max_in_flight_puts(&self) -> usize {
        self.max_in_flight_puts.load(Ordering::SeqCst)
    }

    async fn store_upload(
        &self,
        key: &str,
        name: &str,
        mut body: ByteReader,
        size: u64,
    ) -> Result<UploadResult> {
        let (fail, delay) = {
            let faults = lock(&self.faults);
            (faults.fail_put.contains(key), faults.put_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(Error::Network(format!("injected upload failure for {key}")));
        }

        let mut data = Vec::with_capacity(size as usize);
        body.read_to_end(&mut data).await?;
        if data.len() as u64 != size {
            return Err(Error::General(format!(
                "size mismatch for {key}: declared {size}, read {}",
                data.len()
            )));
        }

        let hash = content_hash(&data);
        let object = StoredObject {
            hash: hash.clone(),
            put_time: jiff::Timestamp::now().as_second(),
            name: name.to_string(),
            data,
        };
        lock(&self.objects).insert(key.to_string(), object);

        Ok(UploadResult {
            key: key.to_string(),
            hash,
            size: size as i64,
            bucket: self.bucket.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        cursor: Option<String>,
        page_size: usize,
    ) -> Result<ListPage> {
        let served = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = lock(&self.faults).fail_listing_after {
            if served >= limit {
                return Err(Error::Network("injected listing failure".into()));
            }
        }

        let limit = page_size.clamp(1, self.max_page_size);
        let start = match cursor.filter(|c| !c.is_empty()) {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(prefix.to_string()),
        };

        let objects = lock(&self.objects);
        let mut matching = objects
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));

        let entries: Vec<ListEntry> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| ListEntry {
                key: key.clone(),
                hash: object.hash.clone(),
                size: object.data.len() as i64,
                put_time: object.put_time,
                mime_type: "application/octet-stream".to_string(),
                type_tag: 0,
            })
            .collect();
        let has_more = matching.next().is_some();

        Ok(ListPage {
            next_cursor: if has_more {
                entries.last().map(|e| e.key.clone())
            } else {
                None
            },
            entries,
            has_more,
        })
    }

    async fn put(&self, key: &str, name: &str, body: ByteReader, size: u64) -> Result<UploadResult> {
        let now = self.in_flight_puts.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_puts.fetch_max(now, Ordering::SeqCst);

        let result = self.store_upload(key, name, body, size).await;

        self.in_flight_puts.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if lock(&self.faults).fail_delete.contains(key) {
            return Err(Error::Network(format!("injected delete failure for {key}")));
        }
        match lock(&self.objects).remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    async fn get(&self, key: &str, offset: u64) -> Result<ByteReader> {
        let data = self
            .data(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        let start = (offset as usize).min(data.len());
        Ok(Box::pin(std::io::Cursor::new(data[start..].to_vec())))
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        if !self.contains(key) {
            return Err(Error::NotFound(key.to_string()));
        }
        let deadline = jiff::Timestamp::now().as_second() + expires_in.as_secs() as i64;
        Ok(format!(
            "memory://{}/{}?e={deadline}",
            self.bucket,
            key.trim_start_matches('/')
        ))
    }
}
