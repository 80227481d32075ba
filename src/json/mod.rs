//! Helpers over `serde_json::Value` used by the dispatchers.
//!
//! - [`extract_path`]: read a value at a dot/index path
//! - [`substitute_placeholder`]: embed the question into a request template
//! - [`flatten_object`]: turn a nested body into GET query parameters

mod extract;
mod flatten;
mod template;

pub use extract::extract_path;
pub use flatten::{flatten_object, flatten_with, query_pairs};
pub use template::{PROMPT_PLACEHOLDER, substitute_placeholder};

/// Render a JSON value as answer text: strings verbatim, everything else as JSON.
pub fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
