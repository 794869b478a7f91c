//! Main document store interface.
//!
//! A [`DocumentStore`] owns a [`KvStore`] together with the store-wide [`StoreConfig`] and the
//! [`DocumentCodec`] used for every record, and hands out collections bound to them.
//!
//! # Example
//!
//! ```ignore
//! use owldb::prelude::*;
//!
//! let store = DocumentStore::with_config(
//!     InMemoryStore::new(),
//!     StoreConfig::builder().batch_size(50).build()?,
//! )?;
//!
//! let users = store.collection("users")?;
//! let products = store.typed_collection::<Product>()?;
//! # Ok::<(), owldb::error::DocumentStoreError>(())
//! ```

use std::sync::Arc;

use crate::{
    backend::KvStore,
    codec::{BsonCodec, DocumentCodec},
    collection::{Collection, TypedCollection},
    config::{CollectionOptions, StoreConfig},
    document::Document,
    error::DocumentStoreResult,
};

/// A document store bound to a specific key-value backend.
///
/// # Type Parameters
///
/// * `S` - The key-value store implementation
#[derive(Debug)]
pub struct DocumentStore<S: KvStore> {
    store: Arc<S>,
    config: StoreConfig,
    codec: Arc<dyn DocumentCodec>,
}

impl<S: KvStore> DocumentStore<S> {
    /// Creates a document store with the default configuration and the BSON codec.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            config: StoreConfig::default(),
            codec: Arc::new(BsonCodec),
        }
    }

    /// Creates a document store with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`](crate::error::DocumentStoreError::Configuration)
    /// if the configuration is invalid.
    pub fn with_config(store: S, config: StoreConfig) -> DocumentStoreResult<Self> {
        config.validate()?;

        Ok(Self { config, ..Self::new(store) })
    }

    /// Replaces the codec used to encode stored documents.
    ///
    /// Records written with one codec cannot be read back with another.
    pub fn with_codec(mut self, codec: impl DocumentCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &S {
        &self.store
    }

    /// Gets a collection with default options.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the collection
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty.
    pub fn collection(&self, name: &str) -> DocumentStoreResult<Collection<S>> {
        self.collection_with(name, CollectionOptions::default())
    }

    /// Gets a collection with the given options.
    ///
    /// Options are not persisted; every handle to the same collection should be opened with
    /// the same options, otherwise their index entries diverge.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or an index path is invalid.
    pub fn collection_with(&self, name: &str, options: CollectionOptions) -> DocumentStoreResult<Collection<S>> {
        Collection::new(
            name.to_string(),
            Arc::clone(&self.store),
            options,
            self.config,
            Arc::clone(&self.codec),
        )
    }

    /// Gets a typed collection named after `D::collection_name()`.
    pub fn typed_collection<D: Document>(&self) -> DocumentStoreResult<TypedCollection<S, D>> {
        self.typed_collection_with(CollectionOptions::default())
    }

    pub fn typed_collection_with<D: Document>(
        &self,
        options: CollectionOptions,
    ) -> DocumentStoreResult<TypedCollection<S, D>> {
        Ok(TypedCollection::new(self.collection_with(D::collection_name(), options)?))
    }
}
