//! Partial document updates.
//!
//! An [`Update`] is an ordered list of [`UpdateOp`]s applied to a decoded document before it is
//! written back. Updates are built fluently or parsed from MongoDB-style update documents:
//!
//! ```ignore
//! use owldb::update::Update;
//! use serde_json::json;
//!
//! let built = Update::new().inc("stock", -1).push("history", "sold");
//!
//! let parsed = Update::try_from(json!({
//!     "$inc": { "stock": -1 },
//!     "$push": { "history": "sold" },
//! }))?;
//! # Ok::<(), owldb::error::DocumentStoreError>(())
//! ```
//!
//! Operators that write a path create missing intermediate objects. Every failure is reported
//! as [`DocumentStoreError::Operator`] naming the operator.

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    value::{Object, PathError, Value},
};

/// A single update operator bound to its field path.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// `$set`: overwrite the value at `path`.
    Set { path: String, value: Value },
    /// `$inc`: add a number to the value at `path`.
    Inc { path: String, amount: Value },
    /// `$unset`: remove the field if present.
    Unset { path: String },
    /// `$rename`: move a value to another path.
    Rename { from: String, to: String },
    /// `$push`: append to an array, creating it if absent.
    Push { path: String, value: Value },
    /// `$pull`: remove the first element equal to `value`.
    Pull { path: String, value: Value },
    /// `$pullAll`: `$pull` once per listed value.
    PullAll { path: String, values: Vec<Value> },
    /// `$pop`: remove the first (`-1`) or last (`1`) element.
    Pop { path: String, direction: i64 },
    /// `$addToSet`: append unless an equal element is already present.
    AddToSet { path: String, value: Value },
}

impl UpdateOp {
    /// The MongoDB operator name, e.g. `$inc`.
    pub fn operator(&self) -> &'static str {
        match self {
            UpdateOp::Set { .. } => "$set",
            UpdateOp::Inc { .. } => "$inc",
            UpdateOp::Unset { .. } => "$unset",
            UpdateOp::Rename { .. } => "$rename",
            UpdateOp::Push { .. } => "$push",
            UpdateOp::Pull { .. } => "$pull",
            UpdateOp::PullAll { .. } => "$pullAll",
            UpdateOp::Pop { .. } => "$pop",
            UpdateOp::AddToSet { .. } => "$addToSet",
        }
    }

    fn paths(&self) -> Vec<&str> {
        match self {
            UpdateOp::Rename { from, to } => vec![from.as_str(), to.as_str()],
            UpdateOp::Set { path, .. }
            | UpdateOp::Inc { path, .. }
            | UpdateOp::Unset { path }
            | UpdateOp::Push { path, .. }
            | UpdateOp::Pull { path, .. }
            | UpdateOp::PullAll { path, .. }
            | UpdateOp::Pop { path, .. }
            | UpdateOp::AddToSet { path, .. } => vec![path.as_str()],
        }
    }

    fn error(&self, message: impl Into<String>) -> DocumentStoreError {
        DocumentStoreError::operator(self.operator(), message)
    }

    fn path_error(&self, err: PathError) -> DocumentStoreError {
        self.error(err.to_string())
    }

    /// Applies this operator to `document`.
    pub fn apply(&self, document: &mut Value) -> DocumentStoreResult<()> {
        if let Some(path) = self
            .paths()
            .into_iter()
            .find(|path| *path == "_id" || path.starts_with("_id."))
        {
            return Err(self.error(format!("cannot modify immutable field {path}")));
        }

        match self {
            UpdateOp::Set { path, value } => {
                document
                    .set_path(path, value.clone())
                    .map_err(|err| self.path_error(err))?;
            }
            UpdateOp::Inc { path, amount } => {
                if !amount.is_number() {
                    return Err(self.error(format!("increment must be numeric, found {}", amount.kind())));
                }

                let next = match document.get_path(path) {
                    None => amount.clone(),
                    Some(Value::Integer(current)) => match amount {
                        Value::Integer(delta) => Value::Integer(
                            current
                                .checked_add(*delta)
                                .ok_or_else(|| self.error(format!("integer overflow on field {path}")))?,
                        ),
                        _ => Value::Float(*current as f64 + amount.as_f64().unwrap_or_default()),
                    },
                    Some(Value::Float(current)) => {
                        Value::Float(current + amount.as_f64().unwrap_or_default())
                    }
                    Some(other) => {
                        return Err(self.error(format!("field {path} is {}, not numeric", other.kind())));
                    }
                };

                document
                    .set_path(path, next)
                    .map_err(|err| self.path_error(err))?;
            }
            UpdateOp::Unset { path } => {
                document.remove_path(path);
            }
            UpdateOp::Rename { from, to } => {
                let value = document
                    .remove_path(from)
                    .ok_or_else(|| self.error(format!("field {from} does not exist")))?;

                document
                    .set_path(to, value)
                    .map_err(|err| self.path_error(err))?;
            }
            UpdateOp::Push { path, value } => match document.get_path_mut(path) {
                Some(Value::Array(items)) => items.push(value.clone()),
                Some(other) => return Err(self.not_an_array(path, other)),
                None => {
                    document
                        .set_path(path, Value::Array(vec![value.clone()]))
                        .map_err(|err| self.path_error(err))?;
                }
            },
            UpdateOp::AddToSet { path, value } => match document.get_path_mut(path) {
                Some(Value::Array(items)) => {
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                }
                Some(other) => return Err(self.not_an_array(path, other)),
                None => {
                    document
                        .set_path(path, Value::Array(vec![value.clone()]))
                        .map_err(|err| self.path_error(err))?;
                }
            },
            UpdateOp::Pull { path, value } => {
                self.pull(document, path, std::slice::from_ref(value))?;
            }
            UpdateOp::PullAll { path, values } => {
                self.pull(document, path, values)?;
            }
            UpdateOp::Pop { path, direction } => {
                if !matches!(direction, -1 | 1) {
                    return Err(self.error(format!("direction must be 1 or -1, found {direction}")));
                }

                match document.get_path_mut(path) {
                    Some(Value::Array(items)) if items.is_empty() => {}
                    Some(Value::Array(items)) => {
                        match direction {
                            -1 => items.remove(0),
                            _ => items.remove(items.len() - 1),
                        };
                    }
                    Some(other) => return Err(self.not_an_array(path, other)),
                    None => {}
                }
            }
        }

        Ok(())
    }

    fn pull(&self, document: &mut Value, path: &str, values: &[Value]) -> DocumentStoreResult<()> {
        match document.get_path_mut(path) {
            Some(Value::Array(items)) => {
                for value in values {
                    if let Some(position) = items.iter().position(|item| item == value) {
                        items.remove(position);
                    }
                }

                Ok(())
            }
            Some(other) => Err(self.not_an_array(path, other)),
            None => Ok(()),
        }
    }

    fn not_an_array(&self, path: &str, found: &Value) -> DocumentStoreError {
        self.error(format!("field {path} is {}, not an array", found.kind()))
    }
}

/// An ordered set of update operators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Appends an operator.
    pub fn op(mut self, op: UpdateOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn set(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(UpdateOp::Set { path: path.into(), value: value.into() })
    }

    pub fn inc(self, path: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.op(UpdateOp::Inc { path: path.into(), amount: amount.into() })
    }

    pub fn unset(self, path: impl Into<String>) -> Self {
        self.op(UpdateOp::Unset { path: path.into() })
    }

    pub fn rename(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.op(UpdateOp::Rename { from: from.into(), to: to.into() })
    }

    pub fn push(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(UpdateOp::Push { path: path.into(), value: value.into() })
    }

    pub fn pull(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(UpdateOp::Pull { path: path.into(), value: value.into() })
    }

    pub fn pull_all<V: Into<Value>>(
        self,
        path: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.op(UpdateOp::PullAll {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// `$pop` with an explicit direction; anything but `1` or `-1` fails when applied.
    pub fn pop(self, path: impl Into<String>, direction: i64) -> Self {
        self.op(UpdateOp::Pop { path: path.into(), direction })
    }

    pub fn pop_first(self, path: impl Into<String>) -> Self {
        self.pop(path, -1)
    }

    pub fn pop_last(self, path: impl Into<String>) -> Self {
        self.pop(path, 1)
    }

    pub fn add_to_set(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(UpdateOp::AddToSet { path: path.into(), value: value.into() })
    }

    /// Applies every operator in order.
    ///
    /// On error the document may be partially modified and must be discarded.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Operator`] for the first operator that cannot be applied.
    pub fn apply(&self, document: &mut Value) -> DocumentStoreResult<()> {
        for op in &self.ops {
            op.apply(document)?;
        }

        Ok(())
    }
}

const SUPPORTED_OPERATORS: [&str; 9] =
    ["$set", "$inc", "$unset", "$rename", "$push", "$pull", "$pullAll", "$pop", "$addToSet"];

fn parse_operands(operator: &str, operand: &Value) -> DocumentStoreResult<Object> {
    operand.as_object().cloned().ok_or_else(|| {
        DocumentStoreError::operator(operator, format!("expects an object of field paths, found {}", operand.kind()))
    })
}

fn parse_update(value: &Value) -> DocumentStoreResult<Update> {
    let map = value.as_object().ok_or_else(|| {
        DocumentStoreError::operator("update", format!("update must be an object, found {}", value.kind()))
    })?;

    let mut update = Update::new();

    for (operator, operand) in map {
        if !SUPPORTED_OPERATORS.contains(&operator.as_str()) {
            return Err(DocumentStoreError::operator(operator.as_str(), "unsupported update operator"));
        }

        let operands = parse_operands(operator, operand)?;

        for (path, argument) in operands {
            let op = match operator.as_str() {
                "$set" => UpdateOp::Set { path, value: argument },
                "$inc" => UpdateOp::Inc { path, amount: argument },
                "$unset" => UpdateOp::Unset { path },
                "$rename" => match argument {
                    Value::String(to) => UpdateOp::Rename { from: path, to },
                    other => {
                        return Err(DocumentStoreError::operator(
                            operator,
                            format!("target of {path} must be a string, found {}", other.kind()),
                        ));
                    }
                },
                "$push" => UpdateOp::Push { path, value: argument },
                "$pull" => UpdateOp::Pull { path, value: argument },
                "$pullAll" => match argument {
                    Value::Array(values) => UpdateOp::PullAll { path, values },
                    other => {
                        return Err(DocumentStoreError::operator(
                            operator,
                            format!("operand of {path} must be an array, found {}", other.kind()),
                        ));
                    }
                },
                "$pop" => match argument {
                    Value::Integer(direction) => UpdateOp::Pop { path, direction },
                    Value::Float(direction) if direction == 1.0 || direction == -1.0 => UpdateOp::Pop {
                        path,
                        direction: direction as i64,
                    },
                    other => {
                        return Err(DocumentStoreError::operator(
                            operator,
                            format!("direction must be 1 or -1, found {other}"),
                        ));
                    }
                },
                "$addToSet" => UpdateOp::AddToSet { path, value: argument },
                other => {
                    return Err(DocumentStoreError::operator(other, "unsupported update operator"));
                }
            };

            update = update.op(op);
        }
    }

    Ok(update)
}

impl TryFrom<Value> for Update {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        parse_update(&value)
    }
}

impl TryFrom<serde_json::Value> for Update {
    type Error = DocumentStoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        parse_update(&Value::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Value {
        value.into()
    }

    fn apply(document: &mut Value, update: serde_json::Value) -> DocumentStoreResult<()> {
        Update::try_from(update)?.apply(document)
    }

    fn operator_of(err: DocumentStoreError) -> String {
        match err {
            DocumentStoreError::Operator { operator, .. } => operator,
            other => panic!("expected an operator error, got {other:?}"),
        }
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut document = doc(json!({ "name": "lamp" }));

        apply(&mut document, json!({ "$set": { "specs.power.watts": 40 } })).unwrap();

        assert_eq!(document.get_path("specs.power.watts"), Some(&Value::Integer(40)));
    }

    #[test]
    fn inc_adds_exactly_the_operand() {
        let mut document = doc(json!({ "stock": 5, "rating": 4.0 }));

        apply(&mut document, json!({ "$inc": { "stock": 3, "rating": 0.5, "views": 1 } })).unwrap();

        assert_eq!(document.get("stock"), Some(&Value::Integer(8)));
        assert_eq!(document.get("rating"), Some(&Value::Float(4.5)));
        assert_eq!(document.get("views"), Some(&Value::Integer(1)));
    }

    #[test]
    fn inc_mixing_integer_and_float_yields_float() {
        let mut document = doc(json!({ "stock": 5 }));

        Update::new().inc("stock", 0.5).apply(&mut document).unwrap();

        assert_eq!(document.get("stock"), Some(&Value::Float(5.5)));
    }

    #[test]
    fn inc_rejects_non_numeric_values() {
        let mut document = doc(json!({ "name": "lamp", "stock": 1 }));

        let err = apply(&mut document, json!({ "$inc": { "name": 1 } })).unwrap_err();
        assert_eq!(operator_of(err), "$inc");

        let err = apply(&mut document, json!({ "$inc": { "stock": "1" } })).unwrap_err();
        assert_eq!(operator_of(err), "$inc");

        let err = Update::new().inc("stock", i64::MAX).apply(&mut document).unwrap_err();
        assert_eq!(operator_of(err), "$inc");
    }

    #[test]
    fn unset_and_rename() {
        let mut document = doc(json!({ "a": 1, "b": { "c": 2 } }));

        apply(&mut document, json!({ "$unset": { "a": "", "nothing": "" } })).unwrap();
        apply(&mut document, json!({ "$rename": { "b.c": "d.e" } })).unwrap();

        assert_eq!(document, doc(json!({ "b": {}, "d": { "e": 2 } })));

        let err = apply(&mut document, json!({ "$rename": { "missing": "x" } })).unwrap_err();
        assert_eq!(operator_of(err), "$rename");
    }

    #[test]
    fn push_creates_and_appends() {
        let mut document = doc(json!({ "name": "lamp" }));

        apply(&mut document, json!({ "$push": { "tags": "new" } })).unwrap();
        apply(&mut document, json!({ "$push": { "tags": "sale" } })).unwrap();

        assert_eq!(document.get("tags"), Some(&Value::from(vec!["new", "sale"])));

        let err = apply(&mut document, json!({ "$push": { "name": "x" } })).unwrap_err();
        assert_eq!(operator_of(err), "$push");
    }

    #[test]
    fn add_to_set_twice_keeps_one_occurrence() {
        let mut document = doc(json!({ "tags": ["a"] }));
        let update = Update::new().add_to_set("tags", "b");

        update.apply(&mut document).unwrap();
        update.apply(&mut document).unwrap();

        assert_eq!(document.get("tags"), Some(&Value::from(vec!["a", "b"])));
    }

    #[test]
    fn pull_removes_only_the_first_match() {
        let mut document = doc(json!({ "tags": ["a", "b", "a", "c"] }));

        apply(&mut document, json!({ "$pull": { "tags": "a", "missing": "x" } })).unwrap();
        assert_eq!(document.get("tags"), Some(&Value::from(vec!["b", "a", "c"])));

        apply(&mut document, json!({ "$pullAll": { "tags": ["a", "c", "z"] } })).unwrap();
        assert_eq!(document.get("tags"), Some(&Value::from(vec!["b"])));
    }

    #[test]
    fn pop_from_either_end() {
        let mut document = doc(json!({ "queue": [1, 2, 3], "empty": [] }));

        Update::new()
            .pop_first("queue")
            .pop_last("queue")
            .pop_last("empty")
            .pop_first("missing")
            .apply(&mut document)
            .unwrap();

        assert_eq!(document.get("queue"), Some(&Value::from(vec![2])));

        let err = Update::new().pop("queue", 2).apply(&mut document).unwrap_err();
        assert_eq!(operator_of(err), "$pop");
    }

    #[test]
    fn unknown_operators_are_named() {
        let err = Update::try_from(json!({ "$currentDate": { "at": true } })).unwrap_err();
        assert_eq!(operator_of(err), "$currentDate");

        let err = Update::try_from(json!({ "name": "replacement" })).unwrap_err();
        assert_eq!(operator_of(err), "name");
    }

    #[test]
    fn unknown_operators_with_empty_operands_are_named() {
        for (update, operator) in [
            (json!({ "$currentDate": {} }), "$currentDate"),
            (json!({ "$set": {}, "$bogus": {} }), "$bogus"),
            (json!({ "name": {} }), "name"),
        ] {
            let err = Update::try_from(update).unwrap_err();
            assert_eq!(operator_of(err), operator);
        }

        assert!(Update::try_from(json!({ "$set": {} })).unwrap().is_empty());
    }

    #[test]
    fn pop_accepts_whole_float_directions() {
        let mut document = doc(json!({ "queue": [1, 2, 3] }));

        apply(&mut document, json!({ "$pop": { "queue": 1.0 } })).unwrap();
        apply(&mut document, json!({ "$pop": { "queue": -1.0 } })).unwrap();
        assert_eq!(document.get("queue"), Some(&Value::from(vec![2])));

        let err = Update::try_from(json!({ "$pop": { "queue": 0.5 } })).unwrap_err();
        assert_eq!(operator_of(err), "$pop");
    }

    #[test]
    fn id_is_immutable() {
        let mut document = doc(json!({ "_id": "a" }));

        let err = apply(&mut document, json!({ "$set": { "_id": "b" } })).unwrap_err();
        assert_eq!(operator_of(err), "$set");

        let err = apply(&mut document, json!({ "$rename": { "name": "_id" } })).unwrap_err();
        assert_eq!(operator_of(err), "$rename");
    }
}
