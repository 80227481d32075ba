//! Endpoint-specific overrides.
//!
//! Some evaluated endpoints need special treatment (shorter timeouts, fixed
//! parameters, POST instead of GET). Overrides are matched by URL substring
//! in table order; the first match wins.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// HTTP method used against an evaluated endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parse a method name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        HttpMethod::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unsupported HTTP method '{}', expected one of GET, POST, PUT, PATCH, DELETE",
                raw
            ))
        })
    }
}

/// Overrides applied when the target URL contains `pattern`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointOverride {
    /// Substring matched against the target URL.
    pub pattern: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Timeout for every attempt, replacing the configured ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Fixed parameters sent instead of the default `groupid`/`session_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    /// Method for the generic dispatcher. POST sends the parameters as a JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
}

impl EndpointOverride {
    /// Returns true if no override value is set.
    pub fn is_empty(&self) -> bool {
        self.timeout_secs.is_none() && self.params.is_none() && self.method.is_none()
    }
}

/// Ordered, read-only table of endpoint overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointOverrides {
    entries: Vec<EndpointOverride>,
}

impl EndpointOverrides {
    pub fn new(entries: Vec<EndpointOverride>) -> Self {
        Self { entries }
    }

    /// A table without entries.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The built-in table: an internal RAG endpoint that only accepts POST
    /// with fixed group/session parameters.
    pub fn builtin() -> Self {
        let params = json!({ "groupid": 12, "session_id": 111 });
        Self::new(vec![EndpointOverride {
            pattern: "10.229.222.15:8000".to_string(),
            note: Some("Internal endpoint that requires specific params".to_string()),
            timeout_secs: Some(5.0),
            params: params.as_object().cloned(),
            method: Some(HttpMethod::Post),
        }])
    }

    /// Find the override for a URL. Returns an empty override if nothing matches.
    pub fn resolve(&self, url: &str) -> EndpointOverride {
        match self.entries.iter().find(|e| url.contains(&e.pattern)) {
            Some(entry) => {
                tracing::info!(endpoint = %entry.pattern, "Using custom configuration for endpoint");
                entry.clone()
            }
            None => EndpointOverride::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointOverride> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EndpointOverrides {
    fn default() -> Self {
        Self::builtin()
    }
}
