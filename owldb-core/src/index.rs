//! Secondary index maintenance.
//!
//! Every declared index field that is present on a document has exactly one entry
//! `i:<collection>|<field>|<value>|<id> -> id`. Mutations keep entries in step by comparing an
//! [`IndexSnapshot`] taken before the change with one taken after it, and touching only the
//! entries whose value actually changed.

use std::collections::BTreeMap;
use tracing::trace;

use crate::{
    backend::WriteTransaction,
    error::DocumentStoreResult,
    keyspace,
    value::Value,
};

/// Values of the declared index fields present on one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    values: BTreeMap<String, Value>,
}

impl IndexSnapshot {
    /// Snapshot of a document that does not exist (before an insert, after a delete).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Index writes needed to move from one snapshot to another.
#[derive(Debug, Default, PartialEq)]
pub struct IndexDelta {
    /// Entry keys to delete.
    pub removed: Vec<Vec<u8>>,
    /// Entry keys to write, with the document ID as value.
    pub added: Vec<(Vec<u8>, Vec<u8>)>,
}

impl IndexDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Writes the delta into `txn`. Removals go first so a re-added key survives.
    pub async fn apply<T: WriteTransaction>(self, txn: &mut T) -> DocumentStoreResult<()> {
        for key in self.removed {
            txn.delete(&key).await?;
        }

        for (key, value) in self.added {
            txn.set(key, value).await?;
        }

        Ok(())
    }
}

/// Index maintenance for one collection and its declared fields.
///
/// Both snapshots of a reconciliation are always captured from the same field list.
#[derive(Debug, Clone)]
pub struct IndexMaintainer {
    collection: String,
    fields: Vec<String>,
}

impl IndexMaintainer {
    pub fn new(collection: impl Into<String>, fields: Vec<String>) -> Self {
        Self { collection: collection.into(), fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Captures the declared fields present on `document`.
    pub fn snapshot(&self, document: &Value) -> IndexSnapshot {
        IndexSnapshot {
            values: self
                .fields
                .iter()
                .filter_map(|field| {
                    document
                        .get_path(field)
                        .map(|value| (field.clone(), value.clone()))
                })
                .collect(),
        }
    }

    /// Computes the entries to remove and add for document `id`.
    ///
    /// A field whose entry key is identical in both snapshots is left untouched.
    pub fn reconcile(&self, id: &str, before: &IndexSnapshot, after: &IndexSnapshot) -> IndexDelta {
        let mut delta = IndexDelta::default();

        for field in &self.fields {
            let old_key = before
                .get(field)
                .map(|value| keyspace::index_key(&self.collection, field, value, id));
            let new_key = after
                .get(field)
                .map(|value| keyspace::index_key(&self.collection, field, value, id));

            if old_key == new_key {
                continue;
            }

            if let Some(key) = old_key {
                delta.removed.push(key);
            }

            if let Some(key) = new_key {
                delta.added.push((key, id.as_bytes().to_vec()));
            }
        }

        trace!(
            collection = %self.collection,
            id,
            removed = delta.removed.len(),
            added = delta.added.len(),
            "reconciled index entries"
        );

        delta
    }
}
