//! Payload normalization at the storage boundary.
//!
//! New writes always use the canonical form: a JSON array of line items.
//! Reads also accept the legacy form, an object keyed by line key whose
//! values carry `product_id`, `variation_id`, `variation`, `quantity` and
//! assorted totals. Line keys are always re-derived from the product and
//! options, whatever was stored. Rows are coerced into a strict [`CartPayload`] here so
//! nothing loosely typed travels further in.

use std::collections::BTreeMap;

use basket_types::{CartPayload, LineItem, ProductId, derive_line_key};
use serde_json::{Map, Value};

/// Why a stored payload could not be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(&'static str),
}

/// Serialize a payload in canonical form.
pub fn encode_payload(payload: &CartPayload) -> serde_json::Result<String> {
    serde_json::to_string(payload)
}

/// Decode a stored payload, normalizing legacy shapes.
///
/// Individual lines that make no sense (not an object, no positive
/// `product_id`) are dropped. Only a payload that is not JSON, or whose top
/// level is neither an array nor an object, is an error.
pub fn decode_payload(raw: &str) -> Result<CartPayload, PayloadError> {
    let value: Value = serde_json::from_str(raw)?;

    let lines: Vec<LineItem> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(normalize_line)
            .collect(),
        Value::Object(map) => map.values().filter_map(normalize_line).collect(),
        Value::Null => return Err(PayloadError::Shape("null")),
        Value::Bool(_) => return Err(PayloadError::Shape("boolean")),
        Value::Number(_) => return Err(PayloadError::Shape("number")),
        Value::String(_) => return Err(PayloadError::Shape("string")),
    };

    Ok(CartPayload::from_lines(lines))
}

fn normalize_line(item: &Value) -> Option<LineItem> {
    let obj = item.as_object()?;

    let product_id = as_id(obj.get("product_id"))?;
    let variation_id = as_id(obj.get("variation_id"));
    let options = obj
        .get("options")
        .or_else(|| obj.get("variation"))
        .and_then(Value::as_object)
        .map(string_map)
        .unwrap_or_default();

    let quantity = as_i64(obj.get("quantity")).unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
    let unit_price = obj.get("unit_price").and_then(Value::as_f64);

    // Stored and legacy keys are discarded so a re-add of the same product
    // and options merges with this line.
    Some(LineItem {
        key: derive_line_key(product_id, variation_id, &options),
        product_id,
        variation_id,
        options,
        quantity,
        unit_price,
    })
}

/// Read an integer that may have been stored as a number or a numeric string.
fn as_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_id(value: Option<&Value>) -> Option<ProductId> {
    as_i64(value)
        .filter(|id| *id > 0)
        .map(|id| id as ProductId)
}

fn string_map(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}
