//! Convenient re-exports of commonly used types from owldb.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use owldb::prelude::*;
//! ```

pub use owldb_core::{
    backend::{KvStore, KvStoreBuilder, ReadTransaction, WriteTransaction},
    collection::{Collection, TypedCollection},
    config::{BulkWritePolicy, CollectionOptions, StoreConfig},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    options::{FindOptions, SortDirection},
    projection::Projection,
    query::{Condition, Expr, Filter, QueryVisitor},
    store::DocumentStore,
    update::{Update, UpdateOp},
    value::{Kind, Timestamp, Value},
};
