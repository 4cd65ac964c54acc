//! Result normalization: model reply text → [`ExtractionResult`].
//!
//! JSON mode only guarantees *some* JSON document. Asked for an array, models
//! variously return the bare array, `{"items": [...]}`, `{"data": [...]}`, or
//! an object under a key of their own choosing (`{"订单": [...]}`). The
//! reply is first classified into a [`ResponseShape`], and only then are
//! rows pulled out, so the key precedence lives in exactly one place:
//! [`resolve_row_key`].
//!
//! Anything that is not, after resolution, an array of objects is rejected
//! outright. There is no best-effort mode: one stray string in the array
//! fails the whole reply rather than silently dropping a line of the order.

use crate::error::Order2XlsxError;
use crate::order::{ExtractionResult, OrderItem};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// How the rows were located in an object reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    Items,
    Data,
    /// No preferred key; the object's first key was used.
    FirstKey(String),
}

impl RowKey {
    pub fn as_str(&self) -> &str {
        match self {
            RowKey::Items => "items",
            RowKey::Data => "data",
            RowKey::FirstKey(k) => k,
        }
    }
}

/// The top-level shape of a parsed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape<'a> {
    /// A bare array.
    Sequence(&'a [Value]),
    /// An object whose resolved key holds an array.
    KeyedSequence { key: RowKey, rows: &'a [Value] },
    /// Anything else; the string says why.
    Unrecognized(String),
}

/// Pick the key whose value should hold the rows.
///
/// `items`, then `data`, then the first key in the object's own order.
/// Returns `None` only for an empty object.
pub fn resolve_row_key(object: &Map<String, Value>) -> Option<RowKey> {
    if object.contains_key("items") {
        Some(RowKey::Items)
    } else if object.contains_key("data") {
        Some(RowKey::Data)
    } else {
        object.keys().next().map(|k| RowKey::FirstKey(k.clone()))
    }
}

/// Classify a parsed reply without extracting anything from it.
pub fn classify(value: &Value) -> ResponseShape<'_> {
    match value {
        Value::Array(rows) => ResponseShape::Sequence(rows),
        Value::Object(object) => {
            let Some(key) = resolve_row_key(object) else {
                return ResponseShape::Unrecognized("reply is an empty JSON object".into());
            };
            match object.get(key.as_str()) {
                Some(Value::Array(rows)) => ResponseShape::KeyedSequence { key, rows },
                Some(other) => ResponseShape::Unrecognized(format!(
                    "value under key '{}' is {}, not a list",
                    key.as_str(),
                    kind(other)
                )),
                None => ResponseShape::Unrecognized(format!("key '{}' vanished", key.as_str())),
            }
        }
        other => ResponseShape::Unrecognized(format!(
            "reply is {}, not a list or object",
            kind(other)
        )),
    }
}

/// Parse and normalize a raw model reply.
///
/// Pure: the same `raw` always yields the same rows.
///
/// # Errors
/// [`Order2XlsxError::MalformedResponse`] if `raw` is not JSON, does not
/// resolve to a list, or the list holds a non-object element.
pub fn normalize_response(raw: &str) -> Result<ExtractionResult, Order2XlsxError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        warn!("Model reply is not JSON: {}", e);
        Order2XlsxError::malformed(format!("reply is not valid JSON ({e})"))
    })?;
    normalize_value(&value)
}

/// [`normalize_response`] for an already-parsed document.
pub fn normalize_value(value: &Value) -> Result<ExtractionResult, Order2XlsxError> {
    let rows = match classify(value) {
        ResponseShape::Sequence(rows) => rows,
        ResponseShape::KeyedSequence { key, rows } => {
            debug!("Rows found under key '{}'", key.as_str());
            rows
        }
        ResponseShape::Unrecognized(reason) => {
            warn!("Unrecognised reply shape: {}", reason);
            return Err(Order2XlsxError::malformed(reason));
        }
    };

    let items = rows
        .iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(fields) => Ok(OrderItem::from_fields(fields.clone())),
            other => Err(Order2XlsxError::malformed(format!(
                "row {} is {}, not an object",
                i + 1,
                kind(other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Normalized {} rows", items.len());
    Ok(ExtractionResult::new(items))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
