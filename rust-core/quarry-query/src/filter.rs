// SPDX-License-Identifier: PMPL-1.0-or-later
//! Filter trees and their evaluation.
//!
//! A [`Filter`] is either a comparison on one field or a [`Combinator`] over
//! child filters. Missing fields fail closed for every operator except
//! `DoesNotEqual` and `DoesNotContain`, which absence satisfies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{QueryError, Result};
use crate::value::{as_number, describe, loose_eq, text_form};

/// Comparison applied by a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperator {
    EqualTo,
    DoesNotEqual,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Contains,
    DoesNotContain,
    EndsWith,
    StartsWith,
}

impl FieldOperator {
    /// Whether a missing field satisfies this operator.
    pub fn satisfied_by_absence(self) -> bool {
        matches!(self, FieldOperator::DoesNotEqual | FieldOperator::DoesNotContain)
    }

    fn is_ordering(self) -> bool {
        matches!(
            self,
            FieldOperator::GreaterThan
                | FieldOperator::GreaterThanOrEqualTo
                | FieldOperator::LessThan
                | FieldOperator::LessThanOrEqualTo
        )
    }
}

/// Boolean operator of a combinator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombinatorOperator {
    /// Every child is true. Empty → true.
    All,
    /// At least one child is true. Empty → false.
    Any,
    /// Exactly one child is true.
    One,
    /// No child is true.
    None,
}

/// Comparison of one document field against a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub operator: FieldOperator,
    pub field: String,
    pub value: Value,
}

/// Boolean combination of child filters, evaluated in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combinator {
    pub operator: CombinatorOperator,
    pub filters: Vec<Filter>,
}

/// A filter tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Field(FieldFilter),
    Combinator(Combinator),
}

impl Filter {
    /// Field comparison.
    pub fn field(operator: FieldOperator, field: impl Into<String>, value: Value) -> Self {
        Filter::Field(FieldFilter {
            operator,
            field: field.into(),
            value,
        })
    }

    pub fn combine(operator: CombinatorOperator, filters: Vec<Filter>) -> Self {
        Filter::Combinator(Combinator { operator, filters })
    }

    pub fn all(filters: Vec<Filter>) -> Self {
        Self::combine(CombinatorOperator::All, filters)
    }

    pub fn any(filters: Vec<Filter>) -> Self {
        Self::combine(CombinatorOperator::Any, filters)
    }

    pub fn one(filters: Vec<Filter>) -> Self {
        Self::combine(CombinatorOperator::One, filters)
    }

    pub fn none(filters: Vec<Filter>) -> Self {
        Self::combine(CombinatorOperator::None, filters)
    }

    /// Check the tree for structural errors before any document is touched.
    ///
    /// `path` is the location of this node in the request, used in errors.
    pub fn validate(&self, path: &str) -> Result<()> {
        match self {
            Filter::Field(f) => f.validate(path),
            Filter::Combinator(c) => {
                if c.operator == CombinatorOperator::One && c.filters.is_empty() {
                    return Err(QueryError::validation(
                        format!("{path}.filters"),
                        "ONE combinator requires at least one filter",
                    ));
                }
                c.filters
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, child)| child.validate(&format!("{path}.filters[{i}]")))
            }
        }
    }

    /// Evaluate the filter against a document.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TypeMismatch`] when a field cannot be coerced to
    /// the type its operator requires.
    pub fn evaluate(&self, doc: &Document) -> Result<bool> {
        match self {
            Filter::Field(f) => f.evaluate(doc),
            Filter::Combinator(c) => c.evaluate(doc),
        }
    }
}

impl FieldFilter {
    fn validate(&self, path: &str) -> Result<()> {
        if self.field.is_empty() {
            return Err(QueryError::validation(format!("{path}.field"), "field name is empty"));
        }
        if self.operator.is_ordering() && as_number(&self.value).is_none() {
            return Err(QueryError::validation(
                format!("{path}.value"),
                format!("{:?} needs a numeric value, found {}", self.operator, describe(&self.value)),
            ));
        }
        if matches!(self.operator, FieldOperator::StartsWith | FieldOperator::EndsWith)
            && !self.value.is_string()
        {
            return Err(QueryError::validation(
                format!("{path}.value"),
                format!("{:?} needs a string value", self.operator),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> Result<bool> {
        let Some(actual) = doc.value(&self.field)? else {
            return Ok(self.operator.satisfied_by_absence());
        };

        match self.operator {
            FieldOperator::EqualTo => Ok(equals(&actual, &self.value)),
            FieldOperator::DoesNotEqual => Ok(!equals(&actual, &self.value)),
            FieldOperator::GreaterThan => self.numeric(&actual).map(|(a, b)| a > b),
            FieldOperator::GreaterThanOrEqualTo => self.numeric(&actual).map(|(a, b)| a >= b),
            FieldOperator::LessThan => self.numeric(&actual).map(|(a, b)| a < b),
            FieldOperator::LessThanOrEqualTo => self.numeric(&actual).map(|(a, b)| a <= b),
            FieldOperator::Contains => self.contains(&actual),
            FieldOperator::DoesNotContain => self.contains(&actual).map(|hit| !hit),
            FieldOperator::StartsWith => self.affix(&actual, |s, p| s.starts_with(p)),
            FieldOperator::EndsWith => self.affix(&actual, |s, p| s.ends_with(p)),
        }
    }

    fn numeric(&self, actual: &Value) -> Result<(f64, f64)> {
        let a = as_number(actual)
            .ok_or_else(|| QueryError::mismatch(&self.field, "number", describe(actual)))?;
        let b = as_number(&self.value)
            .ok_or_else(|| QueryError::mismatch(&self.field, "number", describe(&self.value)))?;
        Ok((a, b))
    }

    fn contains(&self, actual: &Value) -> Result<bool> {
        match actual {
            Value::String(s) => Ok(s.contains(text_form(&self.value).as_str())),
            Value::Array(items) => Ok(items.iter().any(|item| loose_eq(item, &self.value))),
            other => Err(QueryError::mismatch(&self.field, "string or array", describe(other))),
        }
    }

    fn affix(&self, actual: &Value, pred: fn(&str, &str) -> bool) -> Result<bool> {
        let needle = text_form(&self.value);
        match actual {
            Value::String(s) => Ok(pred(s, &needle)),
            Value::Array(items) => Ok(items
                .iter()
                .any(|item| item.as_str().is_some_and(|s| pred(s, &needle)))),
            other => Err(QueryError::mismatch(&self.field, "string or array", describe(other))),
        }
    }
}

impl Combinator {
    fn evaluate(&self, doc: &Document) -> Result<bool> {
        match self.operator {
            CombinatorOperator::All => {
                for f in &self.filters {
                    if !f.evaluate(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CombinatorOperator::Any => {
                for f in &self.filters {
                    if f.evaluate(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CombinatorOperator::One => {
                let mut hits = 0usize;
                for f in &self.filters {
                    if f.evaluate(doc)? {
                        hits += 1;
                        if hits > 1 {
                            return Ok(false);
                        }
                    }
                }
                Ok(hits == 1)
            }
            CombinatorOperator::None => {
                for f in &self.filters {
                    if f.evaluate(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// Array fields equal a scalar when any element does.
fn equals(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| loose_eq(item, expected))
        }
        _ => loose_eq(actual, expected),
    }
}
