//! Prefix deletion
//!
//! Resolves each prefix to its keys through the paginator and deletes them
//! one at a time, recording an outcome per key.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ErrorMode;
use crate::error::Result;
use crate::list::list_all;
use crate::traits::ObjectStore;

/// Result of one delete attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Success,
    Error,
}

/// Outcome of deleting a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpOutcome {
    pub key: String,
    pub status: OpStatus,

    /// Service error text; empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl OpOutcome {
    pub fn success(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: OpStatus::Success,
            message: String::new(),
        }
    }

    pub fn error(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: OpStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }
}

/// Delete every key under each prefix, in prefix order then listing order
///
/// A prefix matching nothing contributes no outcomes. Per-key failures are
/// reported as [`OpStatus::Error`] outcomes and never abort the batch; only a
/// listing failure in strict mode does.
pub async fn delete_all<S: AsRef<str>>(
    store: &dyn ObjectStore,
    prefixes: &[S],
    page_size: usize,
    mode: ErrorMode,
) -> Result<Vec<OpOutcome>> {
    let mut outcomes = Vec::new();

    for prefix in prefixes {
        let prefix = prefix.as_ref();
        let entries = list_all(store, prefix, page_size, mode).await?;
        debug!(prefix, keys = entries.len(), "Deleting prefix");

        for entry in entries {
            match store.delete(&entry.key).await {
                Ok(()) => outcomes.push(OpOutcome::success(entry.key)),
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "Delete failed");
                    outcomes.push(OpOutcome::error(entry.key, e.to_string()));
                }
            }
        }
    }

    Ok(outcomes)
}
