//! Field-update application on JSON document bodies.
//!
//! Dotted paths (`total_sales.count`) address nested maps. Missing
//! intermediate maps are created; a missing numeric field counts as zero.

use std::collections::BTreeMap;

use bizledger_core::FieldUpdate;
use serde_json::{Map, Value};

/// Applies every update to `doc`. On error `doc` may be partially modified;
/// callers run this inside a transaction and discard the body on failure.
pub fn apply_updates(doc: &mut Value, fields: &BTreeMap<String, FieldUpdate>) -> Result<(), String> {
    for (path, update) in fields {
        apply_update(doc, path, update)?;
    }
    Ok(())
}

fn apply_update(doc: &mut Value, path: &str, update: &FieldUpdate) -> Result<(), String> {
    let mut segments = path.split('.').peekable();
    let mut current = doc;

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(format!("empty segment in field path '{path}'"));
        }
        let map = as_object(current, path)?;

        if segments.peek().is_none() {
            let slot = map.entry(segment.to_string()).or_insert(Value::Null);
            return match update {
                FieldUpdate::Set(value) => {
                    *slot = value.clone();
                    Ok(())
                }
                FieldUpdate::Increment(by) => {
                    let base = match slot {
                        Value::Null => 0.0,
                        Value::Number(n) => n.as_f64().unwrap_or(0.0),
                        other => {
                            return Err(format!("cannot increment '{path}': holds {other}"));
                        }
                    };
                    *slot = Value::from(base + by);
                    Ok(())
                }
            };
        }

        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

fn as_object<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, String> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| format!("field path '{path}' crosses a non-object value"))
}

/// Reads a dotted path.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| value.get(segment))
}

/// Reads a dotted path as a number, treating absent fields as zero.
pub fn get_number(doc: &Value, path: &str) -> f64 {
    get_path(doc, path).and_then(Value::as_f64).unwrap_or(0.0)
}
