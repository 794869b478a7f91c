//! In-memory transactional key-value store.
//!
//! Data lives in a persistent ordered map ([`im::OrdMap`]), so opening a transaction takes a
//! snapshot in constant time and readers never block writers. Write transactions buffer their
//! changes and are validated optimistically when they commit.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use im::OrdMap;
use mea::{mutex::Mutex, rwlock::RwLock};
use std::{
    collections::{BTreeMap, HashSet},
    ops::Bound,
    sync::{Arc, Weak},
};
use tracing::{trace, warn};

use owldb_core::{
    backend::{KvPair, KvStore, KvStoreBuilder, ReadTransaction, WriteTransaction},
    error::{DocumentStoreError, DocumentStoreResult},
};

type Data = OrdMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default)]
struct StoreState {
    data: Data,
    /// Commit version that last wrote each key, deletions included. Entries no open write
    /// transaction can conflict with are pruned on commit.
    versions: OrdMap<Vec<u8>, u64>,
    /// Keys written by each commit version, oldest first.
    history: BTreeMap<u64, Vec<Vec<u8>>>,
    /// One ticket per start version with open write transactions.
    open: BTreeMap<u64, Weak<()>>,
    version: u64,
}

impl StoreState {
    fn ticket(&mut self) -> Arc<()> {
        if let Some(ticket) = self.open.get(&self.version).and_then(Weak::upgrade) {
            return ticket;
        }

        let ticket = Arc::new(());
        self.open.insert(self.version, Arc::downgrade(&ticket));
        ticket
    }

    fn oldest_open(&mut self) -> Option<u64> {
        while let Some(entry) = self.open.first_entry() {
            if entry.get().strong_count() > 0 {
                return Some(*entry.key());
            }
            entry.remove();
        }

        None
    }

    // Forgets writes no open transaction started before.
    fn prune(&mut self) {
        let horizon = self.oldest_open().unwrap_or(self.version);

        while let Some(entry) = self.history.first_entry() {
            if *entry.key() > horizon {
                break;
            }

            let (version, keys) = entry.remove_entry();
            for key in keys {
                if self.versions.get(&key) == Some(&version) {
                    self.versions.remove(&key);
                }
            }
        }
    }

    fn changed_since(&self, key: &[u8], version: u64) -> bool {
        self.versions.get(key).is_some_and(|changed| *changed > version)
    }

    fn prefix_changed_since(&self, prefix: &[u8], version: u64) -> bool {
        self.versions
            .range::<_, [u8]>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .any(|(_, changed)| *changed > version)
    }
}

fn prefix_range<'a>(data: &'a Data, prefix: &'a [u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a {
    data.range::<_, [u8]>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

/// Thread-safe in-memory transactional key-value store.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// safely shared across async tasks. Multiple clones of the same instance share the same
/// underlying data.
///
/// # Isolation
///
/// Every transaction reads from the snapshot taken when it was opened. A write transaction
/// remembers the keys and prefixes it read; its commit fails with
/// [`DocumentStoreError::Conflict`] if another transaction committed a change to any of them,
/// or to a key it writes, in the meantime.
///
/// # Example
///
/// ```ignore
/// use owldb_memory::InMemoryStore;
/// use owldb::backend::{KvStore, ReadTransaction, WriteTransaction};
///
/// let store = InMemoryStore::new();
///
/// let mut txn = store.update().await?;
/// txn.set(b"greeting".to_vec(), b"hello".to_vec()).await?;
/// txn.commit().await?;
///
/// let txn = store.view().await?;
/// assert_eq!(txn.get(b"greeting").await?, Some(b"hello".to_vec()));
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use owldb_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    type ReadTxn = InMemoryReadTxn;
    type WriteTxn = InMemoryWriteTxn;

    async fn view(&self) -> DocumentStoreResult<Self::ReadTxn> {
        let state = self.state.read().await;

        Ok(InMemoryReadTxn { snapshot: state.data.clone() })
    }

    async fn update(&self) -> DocumentStoreResult<Self::WriteTxn> {
        let mut state = self.state.write().await;

        Ok(InMemoryWriteTxn {
            state: Arc::clone(&self.state),
            snapshot: state.data.clone(),
            start_version: state.version,
            ticket: state.ticket(),
            pending: BTreeMap::new(),
            reads: Mutex::new(ReadSet::default()),
        })
    }
}

/// A read-only snapshot of an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryReadTxn {
    snapshot: Data,
}

#[async_trait]
impl ReadTransaction for InMemoryReadTxn {
    async fn get(&self, key: &[u8]) -> DocumentStoreResult<Option<Vec<u8>>> {
        Ok(self.snapshot.get(key).cloned())
    }

    async fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> DocumentStoreResult<BoxStream<'a, DocumentStoreResult<KvPair>>> {
        let pairs = prefix_range(&self.snapshot, prefix).map(|(key, value)| Ok((key.clone(), value.clone())));

        Ok(stream::iter(pairs).boxed())
    }
}

#[derive(Debug, Default)]
struct ReadSet {
    keys: HashSet<Vec<u8>>,
    prefixes: Vec<Vec<u8>>,
}

/// A read-write transaction over an [`InMemoryStore`].
///
/// Writes are buffered until [`WriteTransaction::commit`]; dropping the transaction discards
/// them.
pub struct InMemoryWriteTxn {
    state: Arc<RwLock<StoreState>>,
    snapshot: Data,
    start_version: u64,
    /// Keeps the conflict history since `start_version` from being pruned.
    ticket: Arc<()>,
    /// `None` marks a pending deletion.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    reads: Mutex<ReadSet>,
}

#[async_trait]
impl ReadTransaction for InMemoryWriteTxn {
    async fn get(&self, key: &[u8]) -> DocumentStoreResult<Option<Vec<u8>>> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(pending.clone());
        }

        self.reads.lock().await.keys.insert(key.to_vec());

        Ok(self.snapshot.get(key).cloned())
    }

    async fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> DocumentStoreResult<BoxStream<'a, DocumentStoreResult<KvPair>>> {
        self.reads.lock().await.prefixes.push(prefix.to_vec());

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = prefix_range(&self.snapshot, prefix)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let overlay = self
            .pending
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));

        for (key, value) in overlay {
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }

        Ok(stream::iter(merged.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl WriteTransaction for InMemoryWriteTxn {
    async fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> DocumentStoreResult<()> {
        self.pending.insert(key, Some(value));
        Ok(())
    }

    async fn delete(&mut self, key: &[u8]) -> DocumentStoreResult<()> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    async fn commit(self) -> DocumentStoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let reads = self.reads.lock().await;
        let mut state = self.state.write().await;

        let stale_key = reads
            .keys
            .iter()
            .chain(self.pending.keys())
            .find(|key| state.changed_since(key, self.start_version));
        let stale_prefix = reads
            .prefixes
            .iter()
            .find(|prefix| state.prefix_changed_since(prefix, self.start_version));

        if let Some(stale) = stale_key.or(stale_prefix) {
            let stale = String::from_utf8_lossy(stale).into_owned();
            warn!(key = %stale, "write transaction lost a commit conflict");

            return Err(DocumentStoreError::Conflict(format!(
                "{stale} was modified by a concurrent transaction"
            )));
        }

        state.version += 1;
        let version = state.version;
        let writes = self.pending.len();
        let mut written = Vec::with_capacity(writes);

        for (key, value) in self.pending {
            state.versions.insert(key.clone(), version);
            written.push(key.clone());

            match value {
                Some(value) => state.data.insert(key, value),
                None => state.data.remove(&key),
            };
        }

        state.history.insert(version, written);
        drop(self.ticket);
        state.prune();

        trace!(version, writes, tracked = state.versions.len(), "committed write transaction");

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use owldb_memory::InMemoryStore;
/// use owldb::backend::KvStoreBuilder;
///
/// let store = InMemoryStore::builder().build().await.unwrap();
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl KvStoreBuilder for InMemoryStoreBuilder {
    type Store = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Store> {
        Ok(InMemoryStore::new())
    }
}
