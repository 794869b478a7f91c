//! Collection types for document store operations.
//!
//! A [`Collection`] binds a name, its [`CollectionOptions`] and the store-wide
//! [`StoreConfig`] to the scan engine, the update executor and the index maintainer. Every
//! public operation runs inside exactly one store transaction: read-only for lookups,
//! read-write for mutations. Nothing is written unless that transaction commits.
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped collection working on [`Value`] documents
//! - [`TypedCollection`] - Type-safe collection for a specific [`Document`] type
//!
//! # Example
//!
//! ```ignore
//! use owldb::prelude::*;
//! use serde_json::json;
//!
//! let products = store.collection_with(
//!     "products",
//!     CollectionOptions::builder().timestamps(true).index("sku").build()?,
//! )?;
//!
//! let id = products.insert(json!({ "sku": "A1", "price": 10 })).await?;
//! products
//!     .update_by_id(&id, &Update::new().inc("price", 5))
//!     .await?;
//!
//! let pricey = products
//!     .find(&Expr::try_from(json!({ "price": { "$gt": 12 } }))?)
//!     .await?;
//! # Ok::<(), owldb::error::DocumentStoreError>(())
//! ```
//!
//! # Bulk writes
//!
//! `update_many` reads and filters concurrently, then applies every write from a single task
//! against the one transaction. What happens when some documents fail is chosen by
//! [`BulkWritePolicy`].

use bson::oid::ObjectId;
use futures::StreamExt;
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, warn};

use crate::{
    backend::{KvStore, ReadTransaction, WriteTransaction},
    codec::DocumentCodec,
    config::{BulkWritePolicy, CollectionOptions, StoreConfig},
    document::{Document, DocumentExt},
    error::{AggregateError, DocumentFailure, DocumentStoreError, DocumentStoreResult},
    index::{IndexDelta, IndexMaintainer, IndexSnapshot},
    keyspace,
    options::FindOptions,
    projection::Projection,
    query::Expr,
    scan::{ScanEngine, ScanHit},
    update::Update,
    value::{Timestamp, Value},
};

/// Name of the identifier field every document carries.
pub const ID_FIELD: &str = "_id";
/// Stamped on insert when the collection keeps timestamps.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Stamped on every update when the collection keeps timestamps.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

// A fully computed document write, ready to be applied to a transaction.
struct PreparedWrite {
    key: Vec<u8>,
    bytes: Vec<u8>,
    delta: IndexDelta,
}

/// An untyped collection.
///
/// Cloning is cheap; clones share the underlying store.
#[derive(Debug)]
pub struct Collection<S: KvStore> {
    name: String,
    store: Arc<S>,
    options: CollectionOptions,
    config: StoreConfig,
    codec: Arc<dyn DocumentCodec>,
    indexer: IndexMaintainer,
}

impl<S: KvStore> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            options: self.options.clone(),
            config: self.config,
            codec: Arc::clone(&self.codec),
            indexer: self.indexer.clone(),
        }
    }
}

impl<S: KvStore> Collection<S> {
    /// Creates a collection handle (internal use; see [`DocumentStore`](crate::store::DocumentStore)).
    pub(crate) fn new(
        name: String,
        store: Arc<S>,
        options: CollectionOptions,
        config: StoreConfig,
        codec: Arc<dyn DocumentCodec>,
    ) -> DocumentStoreResult<Self> {
        if name.is_empty() {
            return Err(DocumentStoreError::Configuration("collection name must not be empty".into()));
        }

        config.validate()?;
        let options = options.normalized()?;
        let indexer = IndexMaintainer::new(name.clone(), options.indexes.clone());

        Ok(Self { name, store, options, config, codec, indexer })
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    fn engine(&self) -> ScanEngine<'_> {
        ScanEngine::new(&self.name, Arc::clone(&self.codec), self.config.scan)
    }

    fn not_found(&self, id: &str) -> DocumentStoreError {
        DocumentStoreError::DocumentNotFound(id.to_string(), self.name.clone())
    }

    fn decode(&self, bytes: &[u8]) -> DocumentStoreResult<Value> {
        self.codec.decode(bytes)
    }

    /// Checks the shape of a new document, assigns its ID and stamps `createdAt`.
    fn prepare_insert(&self, document: Value) -> DocumentStoreResult<(String, Value)> {
        let kind = document.kind();
        let Value::Object(mut map) = document else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "document must be an object, found {kind}"
            )));
        };

        let id = match map.get(ID_FIELD) {
            None => {
                let id = ObjectId::new().to_hex();
                map.shift_insert(0, ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(other) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "{ID_FIELD} must be a non-empty string, found {other}"
                )));
            }
        };

        if self.options.timestamps {
            map.insert(CREATED_AT_FIELD.to_string(), Value::Timestamp(Timestamp::now()));
        }

        Ok((id, Value::Object(map)))
    }

    async fn write_new(
        &self,
        txn: &mut S::WriteTxn,
        id: &str,
        document: &Value,
    ) -> DocumentStoreResult<()> {
        let key = keyspace::primary_key(&self.name, id);

        if txn.get(&key).await?.is_some() {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), self.name.clone()));
        }

        let bytes = self.codec.encode(document)?;
        let delta = self
            .indexer
            .reconcile(id, &IndexSnapshot::empty(), &self.indexer.snapshot(document));

        txn.set(key, bytes).await?;
        delta.apply(txn).await
    }

    /// Applies `update` to a copy of `before` and computes every write it implies.
    ///
    /// Nothing touches the transaction here, so a failing document leaves no trace.
    fn prepare_update(
        &self,
        id: &str,
        key: Vec<u8>,
        before: &Value,
        update: &Update,
    ) -> DocumentStoreResult<PreparedWrite> {
        let mut after = before.clone();
        update.apply(&mut after)?;

        if self.options.timestamps {
            after
                .set_path(UPDATED_AT_FIELD, Value::Timestamp(Timestamp::now()))
                .map_err(|err| DocumentStoreError::InvalidDocument(err.to_string()))?;
        }

        let bytes = self.codec.encode(&after)?;
        let delta = self
            .indexer
            .reconcile(id, &self.indexer.snapshot(before), &self.indexer.snapshot(&after));

        Ok(PreparedWrite { key, bytes, delta })
    }

    async fn apply_write(&self, txn: &mut S::WriteTxn, write: PreparedWrite) -> DocumentStoreResult<()> {
        txn.set(write.key, write.bytes).await?;
        write.delta.apply(txn).await
    }

    async fn remove(&self, txn: &mut S::WriteTxn, id: &str, key: &[u8], document: &Value) -> DocumentStoreResult<()> {
        let delta = self
            .indexer
            .reconcile(id, &self.indexer.snapshot(document), &IndexSnapshot::empty());

        txn.delete(key).await?;
        delta.apply(txn).await
    }

    /// Inserts a document and returns its ID.
    ///
    /// A missing `_id` is generated as a 24-character hexadecimal ObjectId. When the collection
    /// keeps timestamps, `createdAt` is set to the current time.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] if the document is not an object or its `_id`
    ///   is not a non-empty string
    /// - [`DocumentStoreError::DocumentAlreadyExists`] if the ID is taken
    pub async fn insert(&self, document: impl Into<Value>) -> DocumentStoreResult<String> {
        let (id, document) = self.prepare_insert(document.into())?;

        let mut txn = self.store.update().await?;
        self.write_new(&mut txn, &id, &document).await?;
        txn.commit().await?;

        debug!(collection = %self.name, id = %id, "inserted document");

        Ok(id)
    }

    /// Inserts several documents in one transaction and returns their IDs in input order.
    ///
    /// The first failing document aborts the whole batch; nothing is written in that case.
    /// Two documents of the batch sharing an ID count as a failure.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::insert`].
    pub async fn insert_many<I, D>(&self, documents: I) -> DocumentStoreResult<Vec<String>>
    where
        I: IntoIterator<Item = D>,
        D: Into<Value>,
    {
        let prepared = documents
            .into_iter()
            .map(|document| self.prepare_insert(document.into()))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let mut txn = self.store.update().await?;
        let mut ids = Vec::with_capacity(prepared.len());

        for (id, document) in prepared {
            self.write_new(&mut txn, &id, &document).await?;
            ids.push(id);
        }

        txn.commit().await?;

        debug!(collection = %self.name, inserted = ids.len(), "inserted documents");

        Ok(ids)
    }

    /// Looks a document up by ID.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if no document has this ID.
    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Value> {
        let txn = self.store.view().await?;

        match txn.get(&keyspace::primary_key(&self.name, id)).await? {
            Some(bytes) => self.decode(&bytes),
            None => Err(self.not_found(id)),
        }
    }

    /// Returns every document matching `filter`, in unspecified order.
    pub async fn find(&self, filter: &Expr) -> DocumentStoreResult<Vec<Value>> {
        self.find_with_options(filter, &FindOptions::default()).await
    }

    /// Returns the documents matching `filter`, projected, sorted and paginated by `options`.
    ///
    /// # Errors
    ///
    /// Fails if any stored document of the collection cannot be decoded.
    pub async fn find_with_options(
        &self,
        filter: &Expr,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        let txn = self.store.view().await?;
        let documents = self.engine().find(&txn, filter, options).await?;

        debug!(collection = %self.name, returned = documents.len(), "find finished");

        Ok(documents)
    }

    /// Returns one document matching `filter`.
    ///
    /// The scan stops as soon as any batch reports a match; which of several matching documents
    /// is returned is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NoMatch`] if nothing matches.
    pub async fn find_one(&self, filter: &Expr) -> DocumentStoreResult<Value> {
        let txn = self.store.view().await?;

        self.engine()
            .first(&txn, filter, &Projection::new())
            .await?
            .map(|hit| hit.document)
            .ok_or_else(|| DocumentStoreError::NoMatch(self.name.clone()))
    }

    /// Applies `update` to the document with the given ID.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::DocumentNotFound`] if no document has this ID
    /// - [`DocumentStoreError::Operator`] if the update cannot be applied; nothing is written
    pub async fn update_by_id(&self, id: &str, update: &Update) -> DocumentStoreResult<()> {
        let mut txn = self.store.update().await?;
        let key = keyspace::primary_key(&self.name, id);

        let bytes = txn.get(&key).await?.ok_or_else(|| self.not_found(id))?;
        let before = self.decode(&bytes)?;

        let write = self.prepare_update(id, key, &before, update)?;
        self.apply_write(&mut txn, write).await?;
        txn.commit().await?;

        debug!(collection = %self.name, id, "updated document");

        Ok(())
    }

    /// Applies `update` to one document matching `filter`.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::NoMatch`] if nothing matches
    /// - [`DocumentStoreError::Operator`] if the update cannot be applied; nothing is written
    pub async fn update_one(&self, filter: &Expr, update: &Update) -> DocumentStoreResult<()> {
        let mut txn = self.store.update().await?;

        let ScanHit { key, document } = self
            .engine()
            .first(&txn, filter, &Projection::new())
            .await?
            .ok_or_else(|| DocumentStoreError::NoMatch(self.name.clone()))?;
        let id = Self::id_of(&key, &document)?;

        let write = self.prepare_update(&id, key, &document, update)?;
        self.apply_write(&mut txn, write).await?;
        txn.commit().await?;

        debug!(collection = %self.name, id = %id, "updated document");

        Ok(())
    }

    /// Applies `update` to every document matching `filter` and returns how many were written.
    ///
    /// Matching runs concurrently; the writes are then applied one by one to the single
    /// transaction of the operation.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Aggregate`] listing every document the update could not be
    /// applied to. Under [`BulkWritePolicy::Atomic`] nothing is committed in that case; under
    /// [`BulkWritePolicy::PartialCommit`] the other documents are committed first.
    pub async fn update_many(&self, filter: &Expr, update: &Update) -> DocumentStoreResult<usize> {
        let mut txn = self.store.update().await?;
        let hits = self.engine().collect(&txn, filter, &Projection::new()).await?;

        let mut writes = Vec::with_capacity(hits.len());
        let mut failures = Vec::new();

        for ScanHit { key, document } in hits {
            let id = match Self::id_of(&key, &document) {
                Ok(id) => id,
                Err(error) => {
                    let id = String::from_utf8_lossy(&key).into_owned();
                    failures.push(DocumentFailure { id, error });
                    continue;
                }
            };

            match self.prepare_update(&id, key, &document, update) {
                Ok(write) => writes.push(write),
                Err(error) => failures.push(DocumentFailure { id, error }),
            }
        }

        if !failures.is_empty() && self.config.bulk_write_policy == BulkWritePolicy::Atomic {
            txn.rollback().await?;
            warn!(
                collection = %self.name,
                failed = failures.len(),
                "bulk update aborted, nothing committed"
            );

            return Err(DocumentStoreError::Aggregate(AggregateError { committed: 0, failures }));
        }

        let written = writes.len();
        for write in writes {
            self.apply_write(&mut txn, write).await?;
        }
        txn.commit().await?;

        if !failures.is_empty() {
            warn!(
                collection = %self.name,
                committed = written,
                failed = failures.len(),
                "bulk update partially committed"
            );

            return Err(DocumentStoreError::Aggregate(AggregateError { committed: written, failures }));
        }

        debug!(collection = %self.name, updated = written, "updated documents");

        Ok(written)
    }

    /// Deletes the document with the given ID along with its index entries.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if no document has this ID.
    pub async fn delete_by_id(&self, id: &str) -> DocumentStoreResult<()> {
        let mut txn = self.store.update().await?;
        let key = keyspace::primary_key(&self.name, id);

        let bytes = txn.get(&key).await?.ok_or_else(|| self.not_found(id))?;
        let document = self.decode(&bytes)?;

        self.remove(&mut txn, id, &key, &document).await?;
        txn.commit().await?;

        debug!(collection = %self.name, id, "deleted document");

        Ok(())
    }

    /// Deletes one document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NoMatch`] if nothing matches.
    pub async fn delete_one(&self, filter: &Expr) -> DocumentStoreResult<()> {
        let mut txn = self.store.update().await?;

        let ScanHit { key, document } = self
            .engine()
            .first(&txn, filter, &Projection::new())
            .await?
            .ok_or_else(|| DocumentStoreError::NoMatch(self.name.clone()))?;
        let id = Self::id_of(&key, &document)?;

        self.remove(&mut txn, &id, &key, &document).await?;
        txn.commit().await?;

        debug!(collection = %self.name, id = %id, "deleted document");

        Ok(())
    }

    /// Deletes every document matching `filter` and returns how many were removed.
    pub async fn delete_many(&self, filter: &Expr) -> DocumentStoreResult<usize> {
        let mut txn = self.store.update().await?;
        let hits = self.engine().collect(&txn, filter, &Projection::new()).await?;

        for ScanHit { key, document } in &hits {
            let id = Self::id_of(key, document)?;
            self.remove(&mut txn, &id, key, document).await?;
        }

        txn.commit().await?;

        debug!(collection = %self.name, deleted = hits.len(), "deleted documents");

        Ok(hits.len())
    }

    /// Reads the index entries recording `field = value` and returns the document IDs they
    /// point to, in key order.
    ///
    /// Queries never use indexes; this exposes what the index maintainer has written.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if `field` is not a declared index.
    pub async fn indexed_ids(&self, field: &str, value: impl Into<Value>) -> DocumentStoreResult<Vec<String>> {
        if !self.indexer.fields().iter().any(|declared| declared == field) {
            return Err(DocumentStoreError::Configuration(format!(
                "{field} is not an indexed field of collection {}",
                self.name
            )));
        }

        let txn = self.store.view().await?;
        let prefix = keyspace::index_value_prefix(&self.name, field, &value.into());
        let mut entries = txn.scan_prefix(&prefix).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next().await {
            let (_, id) = entry?;
            ids.push(String::from_utf8(id).map_err(|err| DocumentStoreError::Decode(err.to_string()))?);
        }

        Ok(ids)
    }

    fn id_of(key: &[u8], document: &Value) -> DocumentStoreResult<String> {
        document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!(
                    "record {} has no string {ID_FIELD}",
                    String::from_utf8_lossy(key)
                ))
            })
    }
}

/// A type-safe collection for documents of type `D`.
///
/// Documents are converted to and from [`Value`] trees through BSON serialization.
#[derive(Debug)]
pub struct TypedCollection<S: KvStore, D: Document> {
    inner: Collection<S>,
    _marker: PhantomData<D>,
}

impl<S: KvStore, D: Document> Clone for TypedCollection<S, D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), _marker: PhantomData }
    }
}

impl<S: KvStore, D: Document> TypedCollection<S, D> {
    pub(crate) fn new(inner: Collection<S>) -> Self {
        Self { inner, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// The untyped view of the same collection.
    pub fn untyped(&self) -> &Collection<S> {
        &self.inner
    }

    /// Converts this typed collection to a different document type.
    ///
    /// This method allows switching between different document types for the same collection.
    pub fn with_type<T: Document>(&self) -> TypedCollection<S, T> {
        TypedCollection::new(self.inner.clone())
    }

    fn decode_all(documents: Vec<Value>) -> DocumentStoreResult<Vec<D>> {
        documents.into_iter().map(D::from_value).collect()
    }

    /// Inserts a document and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`] if serialization or insertion fails.
    pub async fn insert(&self, document: &D) -> DocumentStoreResult<String> {
        self.inner.insert(document.to_value()?).await
    }

    /// Inserts several documents in one transaction.
    pub async fn insert_many(&self, documents: &[D]) -> DocumentStoreResult<Vec<String>> {
        let values = documents
            .iter()
            .map(DocumentExt::to_value)
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.inner.insert_many(values).await
    }

    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<D> {
        D::from_value(self.inner.find_by_id(id).await?)
    }

    pub async fn find(&self, filter: &Expr) -> DocumentStoreResult<Vec<D>> {
        Self::decode_all(self.inner.find(filter).await?)
    }

    /// Like [`Collection::find_with_options`]. A projection must leave every field `D`
    /// requires, or deserialization fails.
    pub async fn find_with_options(&self, filter: &Expr, options: &FindOptions) -> DocumentStoreResult<Vec<D>> {
        Self::decode_all(self.inner.find_with_options(filter, options).await?)
    }

    pub async fn find_one(&self, filter: &Expr) -> DocumentStoreResult<D> {
        D::from_value(self.inner.find_one(filter).await?)
    }

    pub async fn update_by_id(&self, id: &str, update: &Update) -> DocumentStoreResult<()> {
        self.inner.update_by_id(id, update).await
    }

    pub async fn update_one(&self, filter: &Expr, update: &Update) -> DocumentStoreResult<()> {
        self.inner.update_one(filter, update).await
    }

    pub async fn update_many(&self, filter: &Expr, update: &Update) -> DocumentStoreResult<usize> {
        self.inner.update_many(filter, update).await
    }

    pub async fn delete_by_id(&self, id: &str) -> DocumentStoreResult<()> {
        self.inner.delete_by_id(id).await
    }

    pub async fn delete_one(&self, filter: &Expr) -> DocumentStoreResult<()> {
        self.inner.delete_one(filter).await
    }

    pub async fn delete_many(&self, filter: &Expr) -> DocumentStoreResult<usize> {
        self.inner.delete_many(filter).await
    }
}
