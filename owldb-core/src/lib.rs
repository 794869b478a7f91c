//! A document layer over an embedded, transactional, ordered key-value store.
//!
//! This crate is the core of the owldb project and provides:
//!
//! - **Key-value abstraction** ([`backend`]) - The transactional store the documents live in
//! - **Key layout** ([`keyspace`]) - How documents and index entries map onto keys
//! - **Values** ([`value`]) - The tagged value tree documents are made of
//! - **Codecs** ([`codec`]) - Encoding of documents into stored bytes
//! - **Filters** ([`query`], [`evaluator`]) - MongoDB-style filter expressions and their evaluation
//! - **Updates** ([`update`]) - `$set`, `$inc`, `$push` and the other update operators
//! - **Secondary indexes** ([`index`]) - Index entry maintenance on every write
//! - **Scans** ([`scan`]) - Concurrent, batched collection scans
//! - **Result shaping** ([`options`], [`projection`]) - Sort, skip, limit and field selection
//! - **Collections** ([`collection`]) and the **document store** ([`store`])
//! - **Configuration** ([`config`]) and **error handling** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use owldb::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let users = store.collection("users")?;
//!
//! let id = users.insert(json!({ "name": "Alice", "age": 31 })).await?;
//! let adults = users.find(&Filter::gte("age", 18)).await?;
//! ```

pub mod backend;
pub mod codec;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod keyspace;
pub mod options;
pub mod projection;
pub mod query;
pub mod scan;
pub mod store;
pub mod update;
pub mod value;
