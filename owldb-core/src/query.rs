//! Filter construction for document queries.
//!
//! Filters are typed expression trees ([`Expr`]) over dot-separated field paths. They can be
//! built with the [`Filter`] helpers or parsed from MongoDB-style filter documents.
//!
//! # Filter Expression API
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`, `not_in`
//! - Shape: `exists`, `of_type`, `regex`
//! - Negation: `not`
//! - Logical: `and`, `or`, `nor`, `all`
//!
//! ```ignore
//! use owldb::query::{Expr, Filter};
//! use serde_json::json;
//!
//! let built = Filter::gt("price", 15).and(Filter::eq("status", "active"));
//!
//! let parsed = Expr::try_from(json!({
//!     "price": { "$gt": 15 },
//!     "status": "active",
//! }))?;
//! # Ok::<(), owldb::error::DocumentStoreError>(())
//! ```
//!
//! # Semantics
//!
//! A field that does not resolve is *absent*, which is different from `null`: equality,
//! range, `$in`, `$type` and `$regex` never match an absent field, while `$ne` and `$nin` do.

use regex::Regex;
use std::fmt::{Debug, Formatter};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    value::{Kind, Object, Value},
};

/// A compiled `$regex` pattern.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFilter`] if the pattern does not compile.
    pub fn new(pattern: &str) -> DocumentStoreResult<Self> {
        Regex::new(pattern)
            .map(Pattern)
            .map_err(|err| DocumentStoreError::InvalidFilter(format!("invalid $regex: {err}")))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/", self.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// A single operator applied to the value at a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Structurally equal to the operand.
    Eq(Value),
    /// Absent, or not structurally equal to the operand.
    Ne(Value),
    /// Greater than (numbers and timestamps only).
    Gt(Value),
    /// Greater than or equal to (numbers and timestamps only).
    Gte(Value),
    /// Less than (numbers and timestamps only).
    Lt(Value),
    /// Less than or equal to (numbers and timestamps only).
    Lte(Value),
    /// Equal to one of the listed values.
    In(Vec<Value>),
    /// Absent, or equal to none of the listed values.
    Nin(Vec<Value>),
    /// Present (`true`) or absent (`false`).
    Exists(bool),
    /// Present with one of the listed kinds.
    Type(Vec<Kind>),
    /// A string matching the pattern.
    Regex(Pattern),
    /// Negation of all the wrapped conditions holding together.
    Not(Vec<Condition>),
}

/// A filter expression for querying documents.
///
/// `And` of an empty list matches every document; `Or` of an empty list matches none.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every sub-expression must match.
    And(Vec<Expr>),
    /// At least one sub-expression must match.
    Or(Vec<Expr>),
    /// No sub-expression may match.
    Nor(Vec<Expr>),
    /// Every condition must hold for the value at `path`.
    Field {
        /// Dot-separated field path.
        path: String,
        /// Conditions, all of which must hold.
        conditions: Vec<Condition>,
    },
}

impl Expr {
    /// Creates a single-condition field expression.
    pub fn field(path: impl Into<String>, condition: Condition) -> Self {
        Expr::Field { path: path.into(), conditions: vec![condition] }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Nor(vec![self])
    }
}

impl Default for Expr {
    fn default() -> Self {
        Filter::all()
    }
}

/// Helper struct for constructing filter expressions.
///
/// # Example
///
/// ```ignore
/// use owldb::query::Filter;
///
/// let expr = Filter::eq("name", "Alice").and(Filter::gte("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches documents where the field equals the value.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Eq(value.into()))
    }

    /// Matches documents where the field is absent or differs from the value.
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Ne(value.into()))
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Gt(value.into()))
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Gte(value.into()))
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Lt(value.into()))
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(path, Condition::Lte(value.into()))
    }

    /// Matches documents where the field equals any of the values.
    pub fn is_in<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(path, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field is absent or equals none of the values.
    pub fn not_in<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(path, Condition::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field is present (`true`) or absent (`false`).
    pub fn exists(path: impl Into<String>, exists: bool) -> Expr {
        Expr::field(path, Condition::Exists(exists))
    }

    /// Matches documents where the field has the given kind.
    pub fn of_type(path: impl Into<String>, kind: Kind) -> Expr {
        Expr::field(path, Condition::Type(vec![kind]))
    }

    /// Matches documents where the field is a string matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFilter`] if the pattern does not compile.
    pub fn regex(path: impl Into<String>, pattern: &str) -> DocumentStoreResult<Expr> {
        Ok(Expr::field(path, Condition::Regex(Pattern::new(pattern)?)))
    }

    /// Matches documents where `condition` does not hold for the field.
    pub fn not(path: impl Into<String>, condition: Condition) -> Expr {
        Expr::field(path, Condition::Not(vec![condition]))
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn nor(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Nor(exprs.into_iter().collect())
    }
}

fn invalid(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::InvalidFilter(message.into())
}

fn parse_filter(value: &Value) -> DocumentStoreResult<Expr> {
    let map = value
        .as_object()
        .ok_or_else(|| invalid(format!("filter must be an object, found {}", value.kind())))?;

    let mut clauses = Vec::with_capacity(map.len());

    for (key, operand) in map {
        clauses.push(match key.as_str() {
            "$and" => Expr::And(parse_list(key, operand)?),
            "$or" => Expr::Or(parse_list(key, operand)?),
            "$nor" => Expr::Nor(parse_list(key, operand)?),
            other if other.starts_with('$') => {
                return Err(invalid(format!("unknown top-level operator {other}")));
            }
            path => Expr::Field {
                path: path.to_string(),
                conditions: parse_conditions(operand)?,
            },
        });
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

fn parse_list(operator: &str, operand: &Value) -> DocumentStoreResult<Vec<Expr>> {
    operand
        .as_array()
        .ok_or_else(|| invalid(format!("{operator} expects an array of filters")))?
        .iter()
        .map(parse_filter)
        .collect()
}

fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.keys().any(|key| key.starts_with('$')))
}

fn parse_conditions(operand: &Value) -> DocumentStoreResult<Vec<Condition>> {
    match operand {
        Value::Object(map) if is_operator_object(operand) => parse_operator_object(map),
        literal => Ok(vec![Condition::Eq(literal.clone())]),
    }
}

fn parse_operator_object(map: &Object) -> DocumentStoreResult<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(map.len());

    for (operator, operand) in map {
        let condition = match operator.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(parse_values(operator, operand)?),
            "$nin" => Condition::Nin(parse_values(operator, operand)?),
            "$exists" => Condition::Exists(match operand {
                Value::Boolean(flag) => *flag,
                Value::Integer(flag) => *flag != 0,
                _ => return Err(invalid("$exists expects a boolean")),
            }),
            "$type" => Condition::Type(parse_kinds(operand)?),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| invalid("$regex expects a string pattern"))?;
                let options = match map.get("$options") {
                    Some(Value::String(options)) => options.as_str(),
                    Some(_) => return Err(invalid("$options expects a string")),
                    None => "",
                };

                Condition::Regex(compile_regex(pattern, options)?)
            }
            "$options" if map.contains_key("$regex") => continue,
            "$not" => match operand {
                Value::Object(inner) if is_operator_object(operand) => {
                    Condition::Not(parse_operator_object(inner)?)
                }
                _ => return Err(invalid("$not expects an operator object")),
            },
            other => return Err(invalid(format!("unknown operator {other}"))),
        };

        conditions.push(condition);
    }

    Ok(conditions)
}

fn parse_values(operator: &str, operand: &Value) -> DocumentStoreResult<Vec<Value>> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("{operator} expects an array")))
}

fn parse_kinds(operand: &Value) -> DocumentStoreResult<Vec<Kind>> {
    let names: Vec<&str> = match operand {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names
            .iter()
            .map(|name| name.as_str().ok_or_else(|| invalid("$type expects kind names")))
            .collect::<DocumentStoreResult<_>>()?,
        _ => return Err(invalid("$type expects a kind name")),
    };

    let mut kinds = Vec::new();
    for name in names {
        kinds.extend(
            Kind::parse_selector(name).ok_or_else(|| invalid(format!("unknown $type {name}")))?,
        );
    }

    Ok(kinds)
}

fn compile_regex(pattern: &str, options: &str) -> DocumentStoreResult<Pattern> {
    if let Some(flag) = options.chars().find(|flag| !matches!(flag, 'i' | 'm' | 's' | 'x')) {
        return Err(invalid(format!("unsupported $options flag {flag}")));
    }

    match options.is_empty() {
        true => Pattern::new(pattern),
        false => Pattern::new(&format!("(?{options}){pattern}")),
    }
}

impl TryFrom<Value> for Expr {
    type Error = DocumentStoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        parse_filter(&value)
    }
}

impl TryFrom<serde_json::Value> for Expr {
    type Error = DocumentStoreError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        parse_filter(&Value::from(value))
    }
}

/// Walks a filter expression tree.
///
/// Filter evaluation is one visitor; other consumers (e.g. translating a filter for another
/// engine) can implement it the same way.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        path: &str,
        conditions: &[Condition],
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Nor(exprs) => self.visit_nor(exprs),
            Expr::Field { path, conditions } => self.visit_field(path, conditions),
        }
    }
}
