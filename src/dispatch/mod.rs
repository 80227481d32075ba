//! Query dispatchers.
//!
//! One dispatcher per endpoint kind, all behind the [`Dispatcher`] trait.
//! A dispatcher turns a question into an answer string or a structured
//! [`DispatchError`]; transport failures never escape as anything else.

mod azure;
mod chat;
mod custom;
mod generic;
mod openai;

pub use azure::AzureDispatcher;
pub use custom::CustomDispatcher;
pub use generic::{ANSWER_FIELDS, GenericDispatcher, RAW_TEXT_LIMIT};
pub use openai::OpenAiDispatcher;

use crate::config::{Config, DispatchConfig};
use crate::error::{DispatchError, EvaluatorError, Result};
use crate::evaluation::EvaluationRequest;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Outcome of a single query.
pub type DispatchResult = std::result::Result<String, DispatchError>;

/// Kind of endpoint being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    /// Generic RAG service queried with `groupid`/`query`/`session_id`.
    #[default]
    Generic,
    /// OpenAI-style chat completion endpoint.
    #[serde(alias = "openai-style")]
    Openai,
    /// Azure-style chat completion endpoint (`api-key` header).
    Azure,
    /// Fully configurable endpoint.
    Custom,
}

impl EndpointKind {
    /// Parse a kind name, case-insensitively. Accepts `openai-style`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Some(EndpointKind::Generic),
            "openai" | "openai-style" => Some(EndpointKind::Openai),
            "azure" => Some(EndpointKind::Azure),
            "custom" => Some(EndpointKind::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Generic => "generic",
            EndpointKind::Openai => "openai",
            EndpointKind::Azure => "azure",
            EndpointKind::Custom => "custom",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends one question to an evaluated endpoint.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// The endpoint kind this dispatcher speaks.
    fn kind(&self) -> EndpointKind;

    /// Ask `question` and return the endpoint's answer.
    async fn dispatch(&self, question: &str) -> DispatchResult;
}

/// Build the dispatcher for a request. Selection happens once per request.
pub fn select_dispatcher(
    request: &EvaluationRequest,
    config: &Config,
    client: &Client,
) -> Box<dyn Dispatcher> {
    let url = request.target_url.trim().to_string();
    let headers = request.extra_headers.clone().unwrap_or_default();

    match request.resolved_kind() {
        EndpointKind::Openai => Box::new(OpenAiDispatcher::new(
            client.clone(),
            url,
            request
                .credential
                .clone()
                .filter(|key| !key.trim().is_empty())
                .or_else(|| config.openai_api_key.clone()),
            &config.dispatch,
        )),
        EndpointKind::Azure => Box::new(AzureDispatcher::new(
            client.clone(),
            url,
            request.credential.clone(),
            headers,
            &config.dispatch,
        )),
        EndpointKind::Custom => Box::new(CustomDispatcher::from_request(
            client.clone(),
            request,
            &config.dispatch,
        )),
        EndpointKind::Generic => Box::new(GenericDispatcher::new(
            client.clone(),
            url,
            headers,
            config,
        )),
    }
}

/// Build the HTTP client shared by all dispatchers.
pub fn build_http_client(config: &DispatchConfig) -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|e| EvaluatorError::Http(format!("Failed to build HTTP client: {}", e)))
}

/// Attach user-supplied headers to a request.
fn with_headers(mut builder: RequestBuilder, headers: &HashMap<String, String>) -> RequestBuilder {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Headers with credential values masked, for logging.
pub fn redact_headers(headers: &HashMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| {
            let lower = k.to_lowercase();
            if lower == "authorization" || lower == "api-key" {
                (k.clone(), "***".to_string())
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}
