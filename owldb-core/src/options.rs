//! Result shaping options for `find` operations.
//!
//! ```ignore
//! use owldb::options::{FindOptions, SortDirection};
//!
//! let options = FindOptions::builder()
//!     .sort("ratings.score", SortDirection::Desc)
//!     .sort("name", SortDirection::Asc)
//!     .skip(10)
//!     .limit(5)
//!     .exclude("price")
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{projection::Projection, value::Value};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    #[default]
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key. Earlier keys take precedence; later keys break ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Dot-separated field path to sort by.
    pub path: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(path: impl Into<String>, direction: SortDirection) -> Self {
        Self { path: path.into(), direction }
    }

    /// Orders two documents by this key. Documents missing the field sort last in both
    /// directions.
    pub fn compare(&self, left: &Value, right: &Value) -> Ordering {
        match (left.get_path(&self.path), right.get_path(&self.path)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => match self.direction {
                SortDirection::Asc => left.sort_cmp(right),
                SortDirection::Desc => right.sort_cmp(left),
            },
        }
    }
}

/// Orders two documents by a list of sort keys; the first key that disagrees decides.
pub fn compare_documents(sort: &[SortField], left: &Value, right: &Value) -> Ordering {
    sort.iter()
        .map(|field| field.compare(left, right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Skip, limit, sort and projection for a `find`.
///
/// A `limit` of zero means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
    /// Number of documents to skip (for pagination).
    pub skip: usize,
    /// Maximum number of documents to return; `0` returns all.
    pub limit: usize,
    /// Sort keys, highest precedence first.
    pub sort: Vec<SortField>,
    /// Field selection.
    pub select: Projection,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new options builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }

    /// Applies sorting, then skip and limit, to a fully collected result set.
    pub fn paginate(&self, mut documents: Vec<Value>) -> Vec<Value> {
        if !self.sort.is_empty() {
            documents.sort_by(|left, right| compare_documents(&self.sort, left, right));
        }

        if self.skip >= documents.len() {
            return Vec::new();
        }

        let mut page = documents.split_off(self.skip);
        if self.limit > 0 {
            page.truncate(self.limit);
        }

        page
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = limit;
        self
    }

    /// Appends a sort key.
    ///
    /// # Arguments
    ///
    /// * `path` - The field path to sort by
    /// * `direction` - The sort direction (ascending or descending)
    pub fn sort(mut self, path: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(SortField::new(path, direction));
        self
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.options.select = self.options.select.include(path);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.options.select = self.options.select.exclude(path);
        self
    }

    /// Replaces the whole projection.
    pub fn select(mut self, select: Projection) -> Self {
        self.options.select = select;
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}
