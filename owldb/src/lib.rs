//! Main owldb crate: MongoDB-style documents over an embedded, transactional key-value store.
//!
//! This crate is the primary entry point for users of owldb. It re-exports the core types
//! from `owldb-core` and the in-memory backend from `owldb-memory`.
//!
//! # Features
//!
//! - **Schemaless documents** - Insert any JSON-like object; IDs are generated when missing
//! - **MongoDB-style filters** - `$eq`, `$in`, `$regex`, `$and`, `$or`, `$nor` and friends
//! - **Update operators** - `$set`, `$inc`, `$push`, `$addToSet` and more
//! - **Secondary indexes** - Maintained transactionally with every write
//! - **Concurrent scans** - Batched, parallel filtering with early exit for single lookups
//!
//! # Quick Start
//!
//! ```ignore
//! use owldb::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.collection_with(
//!         "users",
//!         CollectionOptions::builder().timestamps(true).index("email").build()?,
//!     )?;
//!
//!     let id = users
//!         .insert(json!({ "name": "Alice", "email": "alice@example.com", "age": 31 }))
//!         .await?;
//!
//!     users.update_by_id(&id, &Update::new().inc("age", 1)).await?;
//!
//!     let adults = users
//!         .find_with_options(
//!             &Expr::try_from(json!({ "age": { "$gte": 18 } }))?,
//!             &FindOptions::builder().sort("age", SortDirection::Desc).limit(10).build(),
//!         )
//!         .await?;
//!
//!     println!("{} adults", adults.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Typed Documents
//!
//! Types implementing [`Document`](document::Document) get a
//! [`TypedCollection`](collection::TypedCollection) that converts to and from the stored form:
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<String>,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! let users = store.typed_collection::<User>()?;
//! let id = users.insert(&User { id: None, name: "Bob".into() }).await?;
//! let bob: User = users.find_by_id(&id).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory transactional store for development and testing
//!
//! Other engines plug in by implementing [`backend::KvStore`].

pub mod prelude;

pub use owldb_core::{
    backend, codec, collection, config, document, error, evaluator, index, keyspace, options, projection, query,
    scan, store, update, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use owldb_memory::{InMemoryReadTxn, InMemoryStore, InMemoryStoreBuilder, InMemoryWriteTxn};
}
