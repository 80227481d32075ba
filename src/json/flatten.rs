use serde_json::{Map, Value};

/// Flatten nested objects into one level of `_`-joined keys.
pub fn flatten_object(object: &Map<String, Value>) -> Map<String, Value> {
    flatten_with(object, "", "_")
}

/// Flatten nested objects into one level, joining key paths with `separator`
/// under `parent` (empty for none).
///
/// Only objects are descended into. Arrays are kept as opaque leaves rather
/// than expanded by index.
pub fn flatten_with(object: &Map<String, Value>, parent: &str, separator: &str) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into(object, parent, separator, &mut flat);
    flat
}

fn flatten_into(object: &Map<String, Value>, parent: &str, separator: &str, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let full_key = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, separator, key)
        };

        match value {
            Value::Object(nested) => flatten_into(nested, &full_key, separator, out),
            leaf => {
                out.insert(full_key, leaf.clone());
            }
        }
    }
}

/// Encode a flat object as query-string pairs.
///
/// Strings are sent verbatim, other scalars as their JSON text, `null` is
/// omitted and arrays repeat the key once per element.
pub fn query_pairs(flat: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(flat.len());
    for (key, value) in flat {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((key.clone(), super::value_to_text(item)));
                }
            }
            other => pairs.push((key.clone(), super::value_to_text(other))),
        }
    }
    pairs
}
