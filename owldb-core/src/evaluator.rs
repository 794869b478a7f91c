//! Filter evaluation against decoded documents.
//!
//! [`DocumentEvaluator`] is the [`QueryVisitor`] that decides whether one document matches a
//! filter expression.

use std::cmp::Ordering;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Condition, Expr, QueryVisitor},
    value::Value,
};

pub struct DocumentEvaluator<'a> {
    document: &'a Value,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Value) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Shorthand for evaluating `expr` against `document`.
    pub fn matches(document: &Value, expr: &Expr) -> DocumentStoreResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }

    fn check(field: Option<&Value>, condition: &Condition) -> bool {
        match condition {
            Condition::Eq(expected) => field == Some(expected),
            Condition::Ne(expected) => field != Some(expected),
            Condition::Gt(bound) => Self::ordered(field, bound, Ordering::is_gt),
            Condition::Gte(bound) => Self::ordered(field, bound, Ordering::is_ge),
            Condition::Lt(bound) => Self::ordered(field, bound, Ordering::is_lt),
            Condition::Lte(bound) => Self::ordered(field, bound, Ordering::is_le),
            Condition::In(values) => field.is_some_and(|value| values.contains(value)),
            Condition::Nin(values) => !field.is_some_and(|value| values.contains(value)),
            Condition::Exists(expected) => field.is_some() == *expected,
            Condition::Type(kinds) => field.is_some_and(|value| kinds.contains(&value.kind())),
            Condition::Regex(pattern) => match field {
                Some(Value::String(text)) => pattern.is_match(text),
                _ => false,
            },
            Condition::Not(conditions) => !conditions
                .iter()
                .all(|condition| Self::check(field, condition)),
        }
    }

    // Incomparable pairs (mismatched kinds, strings, NaN) never satisfy a range operator.
    fn ordered(field: Option<&Value>, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
        field
            .and_then(|value| value.compare(bound))
            .is_some_and(accept)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_or(exprs)?)
    }

    fn visit_field(
        &mut self,
        path: &str,
        conditions: &[Condition],
    ) -> Result<Self::Output, Self::Error> {
        let field = self.document.get_path(path);

        Ok(conditions
            .iter()
            .all(|condition| Self::check(field, condition)))
    }
}
