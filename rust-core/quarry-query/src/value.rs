// SPDX-License-Identifier: PMPL-1.0-or-later
//! Coercion rules shared by filters, boosts, aggregates and sorting.
//!
//! Field values arrive as JSON. A value is *numeric* when it is a JSON number
//! or a string that parses as a finite `f64`; everything else compares by its
//! text form.

use std::cmp::Ordering;

use serde_json::Value;

/// Longest preview of a value quoted in error messages.
const PREVIEW_LEN: usize = 64;

/// Coerce a value to a finite number.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Text form of a scalar: strings verbatim, everything else as compact JSON.
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Equality with numeric coercion: `150`, `150.0` and `"150"` are equal.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order used for sorting. Numeric values come before every
/// non-numeric one and compare by value; the rest compare by text form.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => text_form(a).cmp(&text_form(b)),
    }
}

/// Short human-readable rendering of a value for diagnostics.
pub fn describe(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= PREVIEW_LEN {
        rendered
    } else {
        let mut cut: String = rendered.chars().take(PREVIEW_LEN).collect();
        cut.push('…');
        cut
    }
}
