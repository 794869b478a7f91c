//! Key-value store abstraction the document layer runs on.
//!
//! The collection layer needs very little from its storage engine: ordered keys, point reads,
//! prefix iteration, and two transaction scopes with all-or-nothing commits. This module
//! captures exactly that so different engines (in-memory, embedded LSM, ...) can be plugged in.
//!
//! # Traits
//!
//! - [`KvStore`]: opens read-only and read-write transactions
//! - [`ReadTransaction`]: point lookups and ordered prefix scans over one consistent snapshot
//! - [`WriteTransaction`]: buffered writes committed atomically
//! - [`KvStoreBuilder`]: factory trait for creating store instances
//!
//! # Examples
//!
//! ```ignore
//! use owldb::backend::{KvStore, ReadTransaction, WriteTransaction};
//!
//! let store = MyStoreImpl::new();
//!
//! let mut txn = store.update().await?;
//! txn.set(b"d:users|1".to_vec(), bytes).await?;
//! txn.commit().await?;
//!
//! let txn = store.view().await?;
//! assert!(txn.get(b"d:users|1").await?.is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::error::DocumentStoreResult;

/// A raw key and the bytes stored under it.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Abstract interface for ordered, transactional key-value stores.
///
/// # Thread Safety
///
/// Implementations must be shareable across tasks. Many read transactions may be open at the
/// same time as a write transaction; how isolation is achieved is up to the implementer, but a
/// read transaction must observe a single consistent snapshot for its whole lifetime.
///
/// # Conflicts
///
/// Committing a write transaction must fail with
/// [`DocumentStoreError::Conflict`](crate::error::DocumentStoreError::Conflict) if a key it read
/// or wrote was changed by another transaction that committed after it started.
#[async_trait]
pub trait KvStore: Send + Sync + Debug + 'static {
    /// The read-only transaction type.
    type ReadTxn: ReadTransaction + 'static;
    /// The read-write transaction type.
    type WriteTxn: WriteTransaction + 'static;

    /// Opens a read-only transaction over the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the engine cannot
    /// start a transaction.
    async fn view(&self) -> DocumentStoreResult<Self::ReadTxn>;

    /// Opens a read-write transaction.
    ///
    /// Nothing written through the returned transaction is visible to others until
    /// [`WriteTransaction::commit`] succeeds. Dropping it without committing discards its writes.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the engine cannot
    /// start a transaction.
    async fn update(&self) -> DocumentStoreResult<Self::WriteTxn>;
}

/// Read access shared by both transaction scopes.
#[async_trait]
pub trait ReadTransaction: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the key does not exist.
    async fn get(&self, key: &[u8]) -> DocumentStoreResult<Option<Vec<u8>>>;

    /// Streams every pair whose key starts with `prefix`, in ascending key order.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The key prefix bounding the scan
    async fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> DocumentStoreResult<BoxStream<'a, DocumentStoreResult<KvPair>>>;
}

/// Mutations buffered inside a read-write transaction.
///
/// Reads made through a write transaction observe its own pending writes.
#[async_trait]
pub trait WriteTransaction: ReadTransaction {
    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> DocumentStoreResult<()>;

    /// Removes `key`. Deleting a missing key is not an error.
    async fn delete(&mut self, key: &[u8]) -> DocumentStoreResult<()>;

    /// Atomically publishes every pending write.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Conflict`](crate::error::DocumentStoreError::Conflict) if a
    /// concurrent transaction committed a change to a key this transaction depends on; nothing
    /// is written in that case.
    async fn commit(self) -> DocumentStoreResult<()>
    where
        Self: Sized;

    /// Discards every pending write.
    ///
    /// The default implementation simply drops the transaction.
    async fn rollback(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating store instances.
///
/// Implementers provide configuration-based construction of stores, allowing flexible
/// initialization patterns.
///
/// # Example
///
/// ```ignore
/// use owldb::backend::KvStoreBuilder;
/// use owldb::memory::InMemoryStore;
///
/// let store = InMemoryStore::builder().build().await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[async_trait]
pub trait KvStoreBuilder: Send {
    /// The type of store this builder creates.
    type Store: KvStore;

    /// Builds and returns a new store instance.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if construction fails.
    async fn build(self) -> DocumentStoreResult<Self::Store>;
}
