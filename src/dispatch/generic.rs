//! Generic RAG dispatcher.
//!
//! Sends `groupid`/`query`/`session_id` to the endpoint, as a query string
//! (GET) or as a JSON body when an endpoint override asks for another
//! method. This is the only dispatcher that retries, and only on timeouts.

use super::{DispatchResult, Dispatcher, EndpointKind, redact_headers, with_headers};
use crate::config::Config;
use crate::endpoint::{EndpointOverride, HttpMethod};
use crate::error::{DispatchError, DispatchErrorKind};
use crate::json::{query_pairs, value_to_text};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Response fields searched for the answer, in order.
pub const ANSWER_FIELDS: &[&str] = &["answer", "response", "result", "output", "text"];

/// Characters of a non-JSON body kept as the answer.
pub const RAW_TEXT_LIMIT: usize = 500;

pub struct GenericDispatcher {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
    endpoint: EndpointOverride,
    group_id: i64,
    session_id: i64,
    timeout: Duration,
    max_retries: u32,
}

impl GenericDispatcher {
    pub fn new(client: Client, url: String, mut headers: HashMap<String, String>, config: &Config) -> Self {
        let endpoint = config.endpoints.resolve(&url);
        headers.insert("accept".to_string(), "application/json".to_string());

        Self {
            client,
            url,
            headers,
            endpoint,
            group_id: config.dispatch.group_id,
            session_id: config.dispatch.session_id,
            timeout: config.dispatch.timeout(),
            max_retries: config.dispatch.max_retries,
        }
    }

    /// Parameters for one question: the override's fixed parameters with the
    /// query merged in, or the default group/session pair.
    fn params(&self, question: &str) -> Map<String, Value> {
        let mut params = match &self.endpoint.params {
            Some(fixed) if !fixed.is_empty() => fixed.clone(),
            _ => {
                let mut defaults = Map::new();
                defaults.insert("groupid".to_string(), Value::from(self.group_id));
                defaults.insert("session_id".to_string(), Value::from(self.session_id));
                defaults
            }
        };
        params.insert("query".to_string(), Value::String(question.to_string()));
        params
    }

    /// Half the configured timeout on the first attempt, the full timeout
    /// afterwards. An override timeout replaces both.
    fn attempt_timeout(&self, attempt: u32) -> Duration {
        if let Some(secs) = self.endpoint.timeout_secs {
            return Duration::from_secs_f64(secs);
        }
        if attempt == 0 {
            self.timeout / 2
        } else {
            self.timeout
        }
    }

    fn method(&self) -> HttpMethod {
        self.endpoint.method.unwrap_or_default()
    }

    async fn attempt(&self, params: &Map<String, Value>, timeout: Duration) -> Result<String, reqwest::Error> {
        let builder = with_headers(
            self.client.request(self.method().into(), &self.url),
            &self.headers,
        )
        .timeout(timeout);

        let builder = match self.method() {
            HttpMethod::Get => builder.query(&query_pairs(params)),
            _ => builder.json(params),
        };

        let response = builder.send().await?;
        tracing::info!(status = response.status().as_u16(), "Response received");
        response.error_for_status()?.text().await
    }

    /// Turn a response body into an answer.
    pub fn answer_from_body(body: &str) -> String {
        match serde_json::from_str::<Value>(body) {
            Ok(data) => {
                tracing::info!(
                    response_type = json_type(&data),
                    "Successfully parsed JSON response"
                );
                match ANSWER_FIELDS.iter().find_map(|field| data.get(*field)) {
                    Some(answer) => value_to_text(answer),
                    None => {
                        tracing::warn!("No known answer field in response, returning whole payload");
                        data.to_string()
                    }
                }
            }
            Err(_) => {
                tracing::warn!("Response is not valid JSON, returning as text");
                body.chars().take(RAW_TEXT_LIMIT).collect()
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    }
}

#[async_trait]
impl Dispatcher for GenericDispatcher {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Generic
    }

    async fn dispatch(&self, question: &str) -> DispatchResult {
        let params = self.params(question);
        let logged_params = Value::Object(params.clone());

        tracing::info!(
            endpoint = %self.url,
            method = %self.method(),
            params = %logged_params,
            headers = ?redact_headers(&self.headers),
            "Attempting to query endpoint"
        );

        for attempt in 0..self.max_retries {
            let timeout = self.attempt_timeout(attempt);
            tracing::info!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                timeout_secs = timeout.as_secs_f64(),
                "Request attempt"
            );

            match self.attempt(&params, timeout).await {
                Ok(body) => return Ok(Self::answer_from_body(&body)),
                Err(err) => {
                    let dispatch_err = DispatchError::from_transport(&err);
                    if dispatch_err.kind == DispatchErrorKind::Timeout {
                        tracing::warn!(attempt = attempt + 1, max_retries = self.max_retries, "Timeout");
                        continue;
                    }
                    tracing::error!(error = %err, "Request failed");
                    return Err(dispatch_err);
                }
            }
        }

        Err(DispatchError::timeout(
            "Server response timeout. Please try again later or check your endpoint configuration.",
        ))
    }
}
