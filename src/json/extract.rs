use serde_json::Value;

/// Walk `value` along a `.`-separated path.
///
/// Each segment is an object key or, when the current value is an array, a
/// non-negative decimal index. Returns `None` as soon as a segment cannot be
/// resolved (missing key, index out of range, traversal into a scalar). An
/// empty path addresses the whole document.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Only plain ASCII digits count as an index ("+1", "-0", " 1" do not).
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
