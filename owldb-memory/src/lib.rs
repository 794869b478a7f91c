//! In-memory key-value backend for owldb.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! [`KvStore`](owldb_core::backend::KvStore) trait. Transactions work on cheap snapshots of a
//! persistent ordered map and are validated optimistically on commit, which makes the store a
//! good fit for development, testing and small embedded deployments.
//!
//! # Quick Start
//!
//! ```ignore
//! use owldb::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.collection("users")?;
//!
//!     users.insert(json!({ "name": "Alice" })).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;

pub use store::{InMemoryReadTxn, InMemoryStore, InMemoryStoreBuilder, InMemoryWriteTxn};
