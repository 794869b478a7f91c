//! Field selection applied to query results.
//!
//! A [`Projection`] maps dot-separated paths to include (`true`) or exclude (`false`). Fields
//! are included unless a rule excludes them. The verdict for a field comes from the rule on its
//! own path or, failing that, from the rule on its nearest ancestor, so a specific rule
//! overrides a broader one:
//!
//! ```ignore
//! use owldb::projection::Projection;
//!
//! // drops `ratings` except for `ratings.count`
//! let projection = Projection::new().exclude("ratings").include("ratings.count");
//! ```
//!
//! An object that loses all of its members to the projection is removed as well.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::{Object, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection {
    rules: BTreeMap<String, bool>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.rules.insert(path.into(), true);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.rules.insert(path.into(), false);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether the field at `path` is kept.
    pub fn verdict(&self, path: &str) -> bool {
        if let Some(verdict) = self.rules.get(path) {
            return *verdict;
        }

        let mut ancestor = path;
        while let Some((parent, _)) = ancestor.rsplit_once('.') {
            if let Some(verdict) = self.rules.get(parent) {
                return *verdict;
            }
            ancestor = parent;
        }

        true
    }

    fn has_rules_below(&self, path: &str) -> bool {
        let prefix = format!("{path}.");

        self.rules
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    /// Projects `document`, returning `None` if nothing is left of it.
    pub fn apply(&self, document: Value) -> Option<Value> {
        if self.rules.is_empty() {
            return Some(document);
        }

        match document {
            Value::Object(map) => {
                let projected = self.project_object(map, "");
                (!projected.is_empty()).then_some(Value::Object(projected))
            }
            other => Some(other),
        }
    }

    fn project_object(&self, map: Object, parent: &str) -> Object {
        let mut projected = Object::with_capacity(map.len());

        for (key, value) in map {
            let path = match parent {
                "" => key.clone(),
                _ => format!("{parent}.{key}"),
            };

            match value {
                Value::Object(children) if !children.is_empty() && self.has_rules_below(&path) => {
                    let children = self.project_object(children, &path);
                    if !children.is_empty() {
                        projected.insert(key, Value::Object(children));
                    }
                }
                value => {
                    if self.verdict(&path) {
                        projected.insert(key, value);
                    }
                }
            }
        }

        projected
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for Projection {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|(path, verdict)| (path.into(), verdict))
                .collect(),
        }
    }
}
