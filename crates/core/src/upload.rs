//! Recursive tree upload
//!
//! Walks a local directory depth-first and uploads every file it finds as an
//! independent task. Discovery is sequential; uploads run concurrently and
//! are collected at a single join point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::{DEFAULT_RETRY_BACKOFF_MS, ErrorMode, TransferConfig};
use crate::error::{Error, Result};
use crate::path::{local_key, rooted_key};
use crate::traits::{ObjectStore, UploadResult};

/// Upper bound on the wait between two attempts of one file
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Tuning for a tree upload
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Maximum uploads in flight; 0 admits every file at once
    pub concurrency: usize,

    /// Deadline for each upload attempt; a retry gets a fresh deadline
    pub timeout: Option<Duration>,

    /// Extra attempts after a retryable failure
    pub retries: u32,

    /// Wait before the first retry, doubled for each later one
    pub retry_backoff: Duration,

    /// Prefix keys with `/`
    pub rooted_keys: bool,

    /// Whether failures fail the whole push
    pub mode: ErrorMode,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            concurrency: 0,
            timeout: None,
            retries: 0,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            rooted_keys: false,
            mode: ErrorMode::default(),
        }
    }
}

impl UploadOptions {
    /// Wait before retry number `attempt` (starting at 1)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff
            .saturating_mul(factor)
            .min(MAX_RETRY_BACKOFF)
    }
}

impl From<&TransferConfig> for UploadOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            concurrency: config.upload_concurrency,
            timeout: config.upload_timeout(),
            retries: config.upload_retries,
            retry_backoff: config.retry_backoff(),
            rooted_keys: config.rooted_keys,
            mode: config.error_mode,
        }
    }
}

/// A file or directory the upload could not process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub path: String,
    pub message: String,
}

/// Per-item outcome of a tree upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeUploadReport {
    /// Successful uploads, in completion order
    pub uploaded: Vec<UploadResult>,

    /// Everything that failed
    pub failed: Vec<UploadFailure>,
}

impl TreeUploadReport {
    /// Number of items attempted
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    /// Total bytes uploaded
    pub fn bytes(&self) -> i64 {
        self.uploaded.iter().map(|u| u.size).sum()
    }
}

type ProgressFn = dyn Fn(&str, bool) + Send + Sync;

/// Upload one local file to `key`
///
/// The object is stored with `key` as its name.
pub async fn upload_file(store: &dyn ObjectStore, path: &Path, key: &str) -> Result<UploadResult> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();
    store.put(key, key, Box::pin(file), size).await
}

/// Uploads directory trees into an [`ObjectStore`]
#[derive(Clone)]
pub struct TreeUploader {
    store: Arc<dyn ObjectStore>,
    options: UploadOptions,
    progress: Option<Arc<ProgressFn>>,
}

impl TreeUploader {
    pub fn new(store: Arc<dyn ObjectStore>, options: UploadOptions) -> Self {
        Self {
            store,
            options,
            progress: None,
        }
    }

    /// Call `f(key_or_path, succeeded)` as each upload is collected
    pub fn with_progress(mut self, f: impl Fn(&str, bool) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload every file under `root`, returning the successful uploads
    ///
    /// In best-effort mode failed files are logged and left out. In strict
    /// mode any failure yields [`Error::PartialFailure`].
    pub async fn push_tree(&self, root: &Path) -> Result<Vec<UploadResult>> {
        let report = self.push_tree_report(root).await;

        for failure in &report.failed {
            warn!(path = %failure.path, error = %failure.message, "Upload failed");
        }

        if self.options.mode.is_strict() && !report.failed.is_empty() {
            return Err(Error::PartialFailure {
                failed: report.failed.len(),
                total: report.total(),
            });
        }

        Ok(report.uploaded)
    }

    /// Upload every file under `root` and report each item's outcome
    pub async fn push_tree_report(&self, root: &Path) -> TreeUploadReport {
        let semaphore = (self.options.concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.options.concurrency)));

        let mut tasks = JoinSet::new();
        let mut report = TreeUploadReport::default();

        self.walk(root, &semaphore, &mut tasks, &mut report.failed).await;
        debug!(root = %root.display(), files = tasks.len(), "Discovery complete");

        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    report.failed.push(UploadFailure {
                        path: String::from("<unknown>"),
                        message: format!("upload task aborted: {e}"),
                    });
                    continue;
                }
            };

            match outcome {
                Ok(result) => {
                    self.notify(&result.key, true);
                    report.uploaded.push(result);
                }
                Err(e) => {
                    self.notify(&path, false);
                    report.failed.push(UploadFailure {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn notify(&self, item: &str, ok: bool) {
        if let Some(progress) = &self.progress {
            progress(item, ok);
        }
    }

    /// Depth-first discovery; each file is dispatched as soon as it is seen
    ///
    /// Directories are read one at a time in name order. The stack holds the
    /// not-yet-visited entries of every directory on the current path.
    async fn walk(
        &self,
        root: &Path,
        semaphore: &Option<Arc<Semaphore>>,
        tasks: &mut JoinSet<(String, Result<UploadResult>)>,
        failed: &mut Vec<UploadFailure>,
    ) {
        let mut stack = Vec::new();
        match read_sorted(root).await {
            Ok(entries) => stack.push(entries.into_iter()),
            Err(e) => failed.push(unreadable(root, e)),
        }

        while let Some(entries) = stack.last_mut() {
            let Some((path, file_type)) = entries.next() else {
                stack.pop();
                continue;
            };

            let file_type = match file_type {
                Ok(ft) => ft,
                Err(e) => {
                    failed.push(unreadable(&path, e));
                    continue;
                }
            };

            if file_type.is_dir() {
                match read_sorted(&path).await {
                    Ok(children) => stack.push(children.into_iter()),
                    Err(e) => failed.push(unreadable(&path, e)),
                }
            } else if file_type.is_symlink() && is_dir(&path).await {
                debug!(path = %path.display(), "Not following directory symlink");
            } else {
                self.dispatch(path, semaphore.clone(), tasks);
            }
        }
    }

    fn dispatch(
        &self,
        path: PathBuf,
        semaphore: Option<Arc<Semaphore>>,
        tasks: &mut JoinSet<(String, Result<UploadResult>)>,
    ) {
        let store = Arc::clone(&self.store);
        let options = self.options.clone();

        tasks.spawn(async move {
            let display = path.display().to_string();
            let _permit = match semaphore {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let outcome = match local_key(&path) {
                Ok(key) => {
                    let key = if options.rooted_keys { rooted_key(&key) } else { key };
                    upload_with_retry(store.as_ref(), &path, &key, &options).await
                }
                Err(e) => Err(e),
            };
            (display, outcome)
        });
    }
}

type DirEntries = Vec<(PathBuf, std::io::Result<std::fs::FileType>)>;

/// Entries of `dir` sorted by file name
async fn read_sorted(dir: &Path) -> std::io::Result<DirEntries> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let file_type = entry.file_type().await;
        entries.push((entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

fn unreadable(path: &Path, e: std::io::Error) -> UploadFailure {
    debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
    UploadFailure {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

async fn upload_with_retry(
    store: &dyn ObjectStore,
    path: &Path,
    key: &str,
    options: &UploadOptions,
) -> Result<UploadResult> {
    let mut attempt = 0;
    loop {
        let result = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, upload_file(store, path, key))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => upload_file(store, path, key).await,
        };

        match result {
            Ok(uploaded) => {
                debug!(key, size = uploaded.size, attempt, "Uploaded");
                return Ok(uploaded);
            }
            Err(e) if attempt < options.retries && e.is_retryable() => {
                attempt += 1;
                let backoff = options.backoff_for(attempt);
                debug!(key, attempt, ?backoff, error = %e, "Retrying upload");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) -> String {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        local_key(&path).unwrap()
    }

    fn uploader(store: &Arc<MemoryStore>, options: UploadOptions) -> TreeUploader {
        TreeUploader::new(store.clone() as Arc<dyn ObjectStore>, options)
    }

    fn keys(results: &[UploadResult]) -> HashSet<String> {
        results.iter().map(|r| r.key.clone()).collect()
    }

    #[tokio::test]
    async fn test_push_tree_uploads_every_file_with_path_keys() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let x = write(&root, "x.txt", "x");
        let y = write(&root, "sub/y.txt", "yy");

        let store = Arc::new(MemoryStore::new("bkt"));
        let results = uploader(&store, UploadOptions::default())
            .push_tree(&root)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(keys(&results), HashSet::from([x.clone(), y.clone()]));
        assert!(x.ends_with("root/x.txt"));
        assert!(y.ends_with("root/sub/y.txt"));
        assert_eq!(store.data(&y).unwrap(), b"yy");
        assert_eq!(store.name_of(&x).as_deref(), Some(x.as_str()));
        assert!(results.iter().all(|r| r.bucket == "bkt"));
    }

    #[tokio::test]
    async fn test_push_tree_many_files_distinct_keys() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for d in 0..5 {
            for f in 0..8 {
                write(root, &format!("d{d}/nested/f{f}.bin"), "data");
            }
        }
        write(root, "top.txt", "t");

        let store = Arc::new(MemoryStore::new("bkt"));
        let results = uploader(&store, UploadOptions::default())
            .push_tree(root)
            .await
            .unwrap();

        assert_eq!(results.len(), 41);
        assert_eq!(keys(&results).len(), 41);
        assert_eq!(store.keys().len(), 41);
    }

    #[tokio::test]
    async fn test_empty_tree_uploads_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("a/b/c")).unwrap();

        let store = Arc::new(MemoryStore::new("bkt"));
        let report = uploader(&store, UploadOptions::default())
            .push_tree_report(temp.path())
            .await;
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_failed_file_omitted_in_best_effort() {
        let temp = TempDir::new().unwrap();
        let good = write(temp.path(), "good.txt", "ok");
        let bad = write(temp.path(), "bad.txt", "no");

        let store = Arc::new(MemoryStore::new("bkt").fail_put_for(bad.clone()));
        let up = uploader(&store, UploadOptions::default());

        let results = up.push_tree(temp.path()).await.unwrap();
        assert_eq!(keys(&results), HashSet::from([good]));

        let report = up.push_tree_report(temp.path()).await;
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("bad.txt"));
        assert!(report.failed[0].message.contains("injected"));
    }

    #[tokio::test]
    async fn test_strict_mode_reports_partial_failure() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "good.txt", "ok");
        let bad = write(temp.path(), "bad.txt", "no");

        let store = Arc::new(MemoryStore::new("bkt").fail_put_for(bad));
        let options = UploadOptions {
            mode: ErrorMode::Strict,
            ..Default::default()
        };
        let result = uploader(&store, options).push_tree(temp.path()).await;

        assert!(matches!(
            result,
            Err(Error::PartialFailure {
                failed: 1,
                total: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_root_is_a_failure_not_a_panic() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new("bkt"));
        let up = uploader(&store, UploadOptions::default());

        let missing = temp.path().join("missing");
        assert!(up.push_tree(&missing).await.unwrap().is_empty());
        assert_eq!(up.push_tree_report(&missing).await.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let temp = TempDir::new().unwrap();
        for i in 0..12 {
            write(temp.path(), &format!("f{i:02}"), "x");
        }

        let store = Arc::new(MemoryStore::new("bkt").with_put_delay(Duration::from_millis(20)));
        let options = UploadOptions {
            concurrency: 3,
            ..Default::default()
        };
        let results = uploader(&store, options).push_tree(temp.path()).await.unwrap();

        assert_eq!(results.len(), 12);
        assert!(store.max_in_flight_puts() <= 3);
        assert!(store.max_in_flight_puts() >= 1);
    }

    #[tokio::test]
    async fn test_unbounded_fan_out_overlaps_uploads() {
        let temp = TempDir::new().unwrap();
        for i in 0..8 {
            write(temp.path(), &format!("f{i}"), "x");
        }

        let store = Arc::new(MemoryStore::new("bkt").with_put_delay(Duration::from_millis(50)));
        let results = uploader(&store, UploadOptions::default())
            .push_tree(temp.path())
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        assert!(store.max_in_flight_puts() > 1);
    }

    #[tokio::test]
    async fn test_timeout_marks_slow_uploads_failed() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "slow.txt", "zzz");

        let store = Arc::new(MemoryStore::new("bkt").with_put_delay(Duration::from_millis(500)));
        let options = UploadOptions {
            timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let report = uploader(&store, options).push_tree_report(temp.path()).await;

        assert!(report.uploaded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].message.contains("Timed out"));
    }

    fn flaky_store(failures: usize, error: fn() -> Error) -> crate::traits::MockObjectStore {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let mut store = crate::traits::MockObjectStore::new();
        store.expect_put().returning(move |key, name, _, size| {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < failures {
                return Err(error());
            }
            Ok(UploadResult {
                key: key.to_string(),
                hash: String::new(),
                size: size as i64,
                bucket: "bkt".into(),
                name: name.to_string(),
            })
        });
        store
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.txt", "a");

        let store = flaky_store(2, || Error::Network("reset".into()));
        let options = UploadOptions {
            retries: 2,
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        };
        let report = TreeUploader::new(Arc::new(store), options)
            .push_tree_report(temp.path())
            .await;
        assert_eq!(report.uploaded.len(), 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_failures() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.txt", "a");

        let store = flaky_store(1, || Error::Auth("denied".into()));
        let options = UploadOptions {
            retries: 3,
            ..Default::default()
        };
        let report = TreeUploader::new(Arc::new(store), options)
            .push_tree_report(temp.path())
            .await;
        assert!(report.uploaded.is_empty());
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_spaced_by_backoff() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.txt", "a");

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&attempts);
        let mut store = crate::traits::MockObjectStore::new();
        store.expect_put().returning(move |_, _, _, _| {
            seen.lock().unwrap().push(tokio::time::Instant::now());
            Err(Error::Network("connection reset".into()))
        });

        let options = UploadOptions {
            retries: 5,
            retry_backoff: Duration::from_millis(100),
            ..Default::default()
        };
        let expected: Vec<Duration> = (1..=5).map(|n| options.backoff_for(n)).collect();
        let report = TreeUploader::new(Arc::new(store), options)
            .push_tree_report(temp.path())
            .await;
        assert_eq!(report.failed.len(), 1);

        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.len(), 6);
        for (i, pair) in attempts.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            assert!(gap >= expected[i], "attempt {} came after {gap:?}", i + 2);
        }
    }

    #[test]
    fn test_backoff_doubles_and_is_capped() {
        let options = UploadOptions {
            retry_backoff: Duration::from_millis(200),
            ..Default::default()
        };
        assert_eq!(options.backoff_for(1), Duration::from_millis(200));
        assert_eq!(options.backoff_for(2), Duration::from_millis(400));
        assert_eq!(options.backoff_for(3), Duration::from_millis(800));
        assert_eq!(options.backoff_for(10), MAX_RETRY_BACKOFF);
        assert_eq!(options.backoff_for(u32::MAX), MAX_RETRY_BACKOFF);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_is_a_failed_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "ok.txt", "ok");
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("link")).unwrap();

        let store = Arc::new(MemoryStore::new("bkt"));
        let report = uploader(&store, UploadOptions::default())
            .push_tree_report(temp.path())
            .await;
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("link"));
    }

    #[tokio::test]
    async fn test_rooted_keys() {
        let temp = TempDir::new().unwrap();
        let key = write(temp.path(), "a.txt", "a");

        let store = Arc::new(MemoryStore::new("bkt"));
        let options = UploadOptions {
            rooted_keys: true,
            ..Default::default()
        };
        let results = uploader(&store, options).push_tree(temp.path()).await.unwrap();
        assert_eq!(results[0].key, rooted_key(&key));
        assert!(results[0].key.starts_with('/'));
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_item() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a", "1");
        write(temp.path(), "b/c", "2");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let store = Arc::new(MemoryStore::new("bkt"));
        let report = uploader(&store, UploadOptions::default())
            .with_progress(move |item, ok| sink.lock().unwrap().push((item.to_string(), ok)))
            .push_tree_report(temp.path())
            .await;

        assert_eq!(report.uploaded.len(), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(_, ok)| *ok));
    }

    #[tokio::test]
    async fn test_upload_file_uses_file_size() {
        let temp = TempDir::new().unwrap();
        let key = write(temp.path(), "sized.bin", "0123456789");

        let store = MemoryStore::new("bkt");
        let result = upload_file(&store, Path::new(&key), "dest/sized.bin")
            .await
            .unwrap();
        assert_eq!(result.size, 10);
        assert_eq!(result.key, "dest/sized.bin");
    }
}
