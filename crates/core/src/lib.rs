//! qs-core: Core library for the qs object storage client
//!
//! This crate provides the filesystem-like layer over a flat key-value
//! object store, including:
//! - Paginated listing and one-level directory projection
//! - Concurrent recursive tree upload
//! - Prefix deletion with per-key outcomes
//! - Configuration and profile management
//! - The ObjectStore trait backends implement, plus an in-memory backend
//!
//! Nothing here depends on a particular storage SDK.

pub mod client;
pub mod config;
pub mod delete;
pub mod error;
pub mod list;
pub mod memory;
pub mod path;
pub mod profile;
pub mod projection;
pub mod traits;
pub mod upload;

pub use client::StoreClient;
pub use config::{Config, ConfigManager, ErrorMode, TransferConfig};
pub use delete::{OpOutcome, OpStatus};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use profile::{Profile, ProfileManager};
pub use projection::DirectoryEntry;
pub use traits::{ByteReader, ListEntry, ListPage, ObjectStore, UploadResult};
pub use upload::{TreeUploadReport, TreeUploader, UploadFailure, UploadOptions};
