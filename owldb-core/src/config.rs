//! Store-wide and per-collection configuration.
//!
//! Both [`StoreConfig`] and [`CollectionOptions`] can be built fluently or deserialized from a
//! configuration file:
//!
//! ```ignore
//! use owldb::config::{BulkWritePolicy, CollectionOptions, StoreConfig};
//!
//! let config = StoreConfig::builder()
//!     .batch_size(250)
//!     .workers(8)
//!     .bulk_write_policy(BulkWritePolicy::PartialCommit)
//!     .build()?;
//!
//! let products = CollectionOptions::builder()
//!     .timestamps(true)
//!     .index("sku")
//!     .index("specs.color")
//!     .build()?;
//! # Ok::<(), owldb::error::DocumentStoreError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, thread};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Number of candidate records decoded by one scan worker at a time.
pub const DEFAULT_BATCH_SIZE: usize = 100;

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Tuning of the concurrent scan pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Records per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Batches processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
        }
    }
}

impl ScanConfig {
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if either value is zero.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.batch_size == 0 {
            return Err(DocumentStoreError::Configuration("scan batch size must be at least 1".into()));
        }

        if self.workers == 0 {
            return Err(DocumentStoreError::Configuration("scan workers must be at least 1".into()));
        }

        Ok(())
    }
}

/// What `update_many` does when some matched documents fail to update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkWritePolicy {
    /// Nothing is committed if any document fails; every failure is reported.
    #[default]
    Atomic,
    /// Documents that updated cleanly are committed; the failures are reported afterwards.
    PartialCommit,
}

/// Configuration shared by every collection of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub scan: ScanConfig,
    pub bulk_write_policy: BulkWritePolicy,
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if the scan settings are invalid.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        self.scan.validate()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.scan.batch_size = batch_size;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.scan.workers = workers;
        self
    }

    pub fn bulk_write_policy(mut self, policy: BulkWritePolicy) -> Self {
        self.config.bulk_write_policy = policy;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if a value is out of range.
    pub fn build(self) -> DocumentStoreResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-collection behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionOptions {
    /// Stamp `createdAt` on insert and `updatedAt` on update.
    pub timestamps: bool,
    /// Declared index field paths.
    pub indexes: Vec<String>,
}

impl CollectionOptions {
    pub fn builder() -> CollectionOptionsBuilder {
        CollectionOptionsBuilder::default()
    }

    /// Checks the index paths and removes duplicates, keeping first occurrences.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if an index path is empty.
    pub fn normalized(mut self) -> DocumentStoreResult<Self> {
        if self.indexes.iter().any(|path| path.is_empty()) {
            return Err(DocumentStoreError::Configuration("index paths must not be empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        self.indexes.retain(|path| seen.insert(path.clone()));

        Ok(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionOptionsBuilder {
    options: CollectionOptions,
}

impl CollectionOptionsBuilder {
    pub fn timestamps(mut self, timestamps: bool) -> Self {
        self.options.timestamps = timestamps;
        self
    }

    /// Declares an indexed field path.
    pub fn index(mut self, path: impl Into<String>) -> Self {
        self.options.indexes.push(path.into());
        self
    }

    pub fn indexes<P: Into<String>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.options.indexes.extend(paths.into_iter().map(Into::into));
        self
    }

    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if an index path is empty.
    pub fn build(self) -> DocumentStoreResult<CollectionOptions> {
        self.options.normalized()
    }
}
