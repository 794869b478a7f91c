//! Concurrent full-collection scans.
//!
//! A scan walks the primary-record prefix of one collection inside a transaction. Records are
//! grouped into batches of [`ScanConfig::batch_size`] and each batch is decoded, filtered and
//! projected on the Tokio blocking pool, with at most [`ScanConfig::workers`] batches in flight.
//! Every worker fills a private list of hits; a single collector merges those lists, dropping any
//! primary key it has already seen, so no state is shared between workers.
//!
//! Scans must be driven from inside a Tokio runtime.
//!
//! Indexes are never consulted; every query reads the whole collection.
//!
//! When a scan finishes, fails or is dropped, workers still running stop before their next
//! record. [`ScanEngine::first`] relies on this to abandon the remaining batches as soon as one
//! batch reports a match.

use futures::{StreamExt, stream::BoxStream};
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::debug;

use crate::{
    backend::{KvPair, ReadTransaction},
    codec::DocumentCodec,
    config::ScanConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::DocumentEvaluator,
    keyspace,
    options::FindOptions,
    projection::Projection,
    query::Expr,
    value::Value,
};

/// A matching document and the primary key it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit {
    pub key: Vec<u8>,
    pub document: Value,
}

impl ScanHit {
    /// The document's `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the stored document has no string `_id`.
    pub fn id(&self) -> DocumentStoreResult<&str> {
        self.document
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!(
                    "record {} has no string _id",
                    String::from_utf8_lossy(&self.key)
                ))
            })
    }
}

type Batch = Vec<DocumentStoreResult<KvPair>>;

/// Everything a worker needs to process one batch off the scanning task.
#[derive(Clone)]
struct BatchWorker {
    codec: Arc<dyn DocumentCodec>,
    filter: Arc<Expr>,
    select: Arc<Projection>,
    cancelled: Arc<AtomicBool>,
}

impl BatchWorker {
    fn process(&self, batch: Batch) -> DocumentStoreResult<Vec<ScanHit>> {
        let mut hits = Vec::new();

        for entry in batch {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }

            let (key, bytes) = entry?;
            let document = self.codec.decode(&bytes).map_err(|err| match err {
                DocumentStoreError::Decode(message) => DocumentStoreError::Decode(format!(
                    "{}: {message}",
                    String::from_utf8_lossy(&key)
                )),
                other => other,
            })?;

            if !DocumentEvaluator::matches(&document, &self.filter)? {
                continue;
            }

            if let Some(document) = self.select.apply(document) {
                hits.push(ScanHit { key, document });
            }
        }

        Ok(hits)
    }
}

/// Stops the workers of a scan when the scan ends, including when its future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct ScanEngine<'a> {
    collection: &'a str,
    codec: Arc<dyn DocumentCodec>,
    config: ScanConfig,
}

impl<'a> ScanEngine<'a> {
    pub fn new(collection: &'a str, codec: Arc<dyn DocumentCodec>, config: ScanConfig) -> Self {
        Self { collection, codec, config }
    }

    fn worker(&self, filter: &Expr, select: &Projection) -> (BatchWorker, CancelOnDrop) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker = BatchWorker {
            codec: Arc::clone(&self.codec),
            filter: Arc::new(filter.clone()),
            select: Arc::new(select.clone()),
            cancelled: Arc::clone(&cancelled),
        };

        (worker, CancelOnDrop(cancelled))
    }

    /// Streams per-batch results in completion order.
    async fn dispatch<'t, T: ReadTransaction>(
        &self,
        txn: &'t T,
        prefix: &'t [u8],
        worker: BatchWorker,
    ) -> DocumentStoreResult<BoxStream<'t, DocumentStoreResult<Vec<ScanHit>>>> {
        let batches = txn
            .scan_prefix(prefix)
            .await?
            .chunks(self.config.batch_size)
            .map(move |batch| {
                let worker = worker.clone();
                tokio::task::spawn_blocking(move || worker.process(batch))
            })
            .buffer_unordered(self.config.workers)
            .map(|joined| match joined {
                Ok(hits) => hits,
                Err(err) => Err(DocumentStoreError::Backend(format!("scan worker failed: {err}"))),
            })
            .boxed();

        Ok(batches)
    }

    /// Collects every document matching `filter`, projected by `select`, in no particular order.
    ///
    /// # Errors
    ///
    /// Fails on the first record that cannot be read or decoded.
    pub async fn collect<T: ReadTransaction>(
        &self,
        txn: &T,
        filter: &Expr,
        select: &Projection,
    ) -> DocumentStoreResult<Vec<ScanHit>> {
        let prefix = keyspace::collection_prefix(self.collection);
        let (worker, _cancel) = self.worker(filter, select);
        let mut batches = self.dispatch(txn, &prefix, worker).await?;

        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        while let Some(batch) = batches.next().await {
            for hit in batch? {
                if seen.insert(hit.key.clone()) {
                    hits.push(hit);
                }
            }
        }

        debug!(collection = %self.collection, matched = hits.len(), "scan finished");

        Ok(hits)
    }

    /// Returns the first match any worker reports, abandoning the rest of the scan.
    ///
    /// When several documents match, which one is returned is unspecified.
    pub async fn first<T: ReadTransaction>(
        &self,
        txn: &T,
        filter: &Expr,
        select: &Projection,
    ) -> DocumentStoreResult<Option<ScanHit>> {
        let prefix = keyspace::collection_prefix(self.collection);
        let (worker, _cancel) = self.worker(filter, select);
        let mut batches = self.dispatch(txn, &prefix, worker).await?;

        while let Some(batch) = batches.next().await {
            if let Some(hit) = batch?.into_iter().next() {
                debug!(collection = %self.collection, "scan stopped at first match");
                return Ok(Some(hit));
            }
        }

        debug!(collection = %self.collection, "scan found no match");

        Ok(None)
    }

    /// Runs a full `find`: scan, then sort, skip and limit.
    pub async fn find<T: ReadTransaction>(
        &self,
        txn: &T,
        filter: &Expr,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Value>> {
        let documents = self
            .collect(txn, filter, &options.select)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect();

        Ok(options.paginate(documents))
    }
}
