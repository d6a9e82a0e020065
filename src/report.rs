//! Read-only diagnostic projection.
//!
//! Converts the numeric fields of values, levels, and stacks into plain
//! nested arrays (`serde_json::Value`) for display or logging. Numeric
//! content is passed through untouched; this is an observability surface,
//! not part of the update contract.

use serde_json::{json, Value as Json};

use crate::level::Level;
use crate::tensor::Value;

/// A scalar becomes a number, a column vector a flat array, and any other
/// matrix an array of row arrays.
#[must_use]
pub fn value_repr(value: &Value) -> Json {
    match value {
        Value::Scalar(x) => json!(x),
        Value::Matrix(m) if m.ncols() == 1 => {
            Json::Array((0..m.nrows()).map(|r| json!(m[(r, 0)])).collect())
        }
        Value::Matrix(m) => Json::Array(
            (0..m.nrows())
                .map(|r| Json::Array((0..m.ncols()).map(|c| json!(m[(r, c)])).collect()))
                .collect(),
        ),
    }
}

/// The four numeric fields of one level, keyed by name.
#[must_use]
pub fn level_repr(level: &Level) -> Json {
    json!({
        "hypoth": value_repr(&level.hypoth),
        "error": value_repr(&level.error),
        "covar": value_repr(&level.covar),
        "learn": value_repr(&level.learn),
    })
}

/// A whole stack, bottom first.
#[must_use]
pub fn stack_repr(stack: &[Level]) -> Json {
    Json::Array(stack.iter().map(level_repr).collect())
}
