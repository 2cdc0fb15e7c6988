//! Comparison operator semantics and value coercion helpers.
//!
//! Numeric comparisons coerce string operands; anything that still is not
//! a number evaluates to "not satisfied" rather than erroring.

use serde_json::Value;

use crate::graph::CompareOperator;

/// Apply a comparison operator. `actual` of `None` models an absent state
/// key: `exists` is false, `equals` is false, `not-equals` is true.
pub fn compare(op: CompareOperator, actual: Option<&Value>, expected: &Value) -> bool {
    match op {
        CompareOperator::Exists => matches!(actual, Some(v) if !v.is_null()),
        CompareOperator::Equals => actual.map(|a| values_equal(a, expected)).unwrap_or(false),
        CompareOperator::NotEquals => !actual.map(|a| values_equal(a, expected)).unwrap_or(false),
        CompareOperator::GreaterThan => numeric_pair(actual, expected)
            .map(|(a, b)| a > b)
            .unwrap_or(false),
        CompareOperator::LessThan => numeric_pair(actual, expected)
            .map(|(a, b)| a < b)
            .unwrap_or(false),
        CompareOperator::Contains => actual.map(|a| contains(a, expected)).unwrap_or(false),
    }
}

/// Equality with numeric coercion, falling back to display-string equality.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (value_to_f64(a), value_to_f64(b)) {
        return (x - y).abs() < f64::EPSILON;
    }
    if a == b {
        return true;
    }
    value_to_string(a) == value_to_string(b)
}

/// `contains` applies to strings (substring) and ordered sequences
/// (element membership).
pub fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => s.contains(&value_to_string(expected)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

pub fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn numeric_pair(actual: Option<&Value>, expected: &Value) -> Option<(f64, f64)> {
    Some((value_to_f64(actual?)?, value_to_f64(expected)?))
}
