use serde_json::Value;

/// Token replaced by the question text in custom request templates.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Return a copy of `template` with every occurrence of `placeholder` in
/// string leaves replaced by `replacement`, at any depth.
///
/// Object keys are left alone. The template itself is not modified, so one
/// template can be reused for every question.
pub fn substitute_placeholder(template: &Value, placeholder: &str, replacement: &str) -> Value {
    match template {
        Value::String(s) if s.contains(placeholder) => {
            Value::String(s.replace(placeholder, replacement))
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_placeholder(v, placeholder, replacement)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_placeholder(v, placeholder, replacement))
                .collect(),
        ),
        other => other.clone(),
    }
}
