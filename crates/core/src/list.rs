//! Paginated listing
//!
//! Follows the continuation cursor of [`ObjectStore::list_page`] until the
//! service reports no further pages and returns every entry seen.

use tracing::{debug, warn};

use crate::config::ErrorMode;
use crate::error::Result;
use crate::traits::{ListEntry, ObjectStore};

/// List every key under `prefix`
///
/// In [`ErrorMode::BestEffort`] a failing page ends the listing and the
/// entries gathered so far are returned as the complete result; callers
/// cannot tell a truncated listing from a full one. [`ErrorMode::Strict`]
/// returns the page error instead. No retries are attempted.
pub async fn list_all(
    store: &dyn ObjectStore,
    prefix: &str,
    page_size: usize,
    mode: ErrorMode,
) -> Result<Vec<ListEntry>> {
    let page_size = page_size.max(1);
    let mut entries = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = match store.list_page(prefix, cursor.take(), page_size).await {
            Ok(page) => page,
            Err(e) if mode.is_strict() => return Err(e),
            Err(e) => {
                warn!(
                    prefix,
                    pages,
                    collected = entries.len(),
                    error = %e,
                    "Listing stopped early, returning partial result"
                );
                break;
            }
        };

        pages += 1;
        entries.extend(page.entries);

        match page.next_cursor {
            Some(next) if page.has_more && !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    debug!(prefix, pages, entries = entries.len(), "Listing complete");
    Ok(entries)
}
