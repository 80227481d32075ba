//! Custom endpoint dispatcher: configurable method, body template,
//! response path and headers.

use super::{DispatchResult, Dispatcher, EndpointKind, redact_headers, with_headers};
use crate::config::DispatchConfig;
use crate::endpoint::HttpMethod;
use crate::error::{DispatchError, DispatchErrorKind};
use crate::evaluation::EvaluationRequest;
use crate::json::{
    PROMPT_PLACEHOLDER, extract_path, flatten_object, query_pairs, substitute_placeholder,
    value_to_text,
};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

pub struct CustomDispatcher {
    client: Client,
    url: String,
    credential: Option<String>,
    headers: HashMap<String, String>,
    method: HttpMethod,
    template: Option<Value>,
    response_path: String,
    timeout: Duration,
}

impl CustomDispatcher {
    pub fn from_request(client: Client, request: &EvaluationRequest, config: &DispatchConfig) -> Self {
        Self {
            client,
            url: request.target_url.trim().to_string(),
            credential: request.credential.clone().filter(|c| !c.is_empty()),
            headers: request.extra_headers.clone().unwrap_or_default(),
            method: request.http_method,
            template: request.request_template.clone(),
            response_path: request.response_path.clone(),
            timeout: config.timeout(),
        }
    }

    /// Request body for one question.
    fn body(&self, question: &str) -> Value {
        match &self.template {
            Some(template) => substitute_placeholder(template, PROMPT_PLACEHOLDER, question),
            None => json!({ "query": question }),
        }
    }

    /// Interpret a JSON response through the configured response path.
    fn extract_answer(&self, data: &Value) -> DispatchResult {
        match extract_path(data, &self.response_path) {
            Some(answer) => Ok(value_to_text(answer)),
            None => {
                let err = DispatchError::new(
                    DispatchErrorKind::PathNotFound,
                    format!(
                        "Could not find path '{}' in response: {}",
                        self.response_path, data
                    ),
                );
                tracing::error!(error = %err.message, "Response path not found");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Dispatcher for CustomDispatcher {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Custom
    }

    async fn dispatch(&self, question: &str) -> DispatchResult {
        let body = self.body(question);

        tracing::info!(
            endpoint = %self.url,
            method = %self.method,
            has_api_key = self.credential.is_some(),
            request_format = self.template.is_some(),
            response_path = %self.response_path,
            headers = ?redact_headers(&self.headers),
            "Making custom API call"
        );

        let mut builder = with_headers(
            self.client.request(self.method.into(), &self.url),
            &self.headers,
        )
        .timeout(self.timeout);

        if let Some(credential) = &self.credential {
            builder = builder.header("Authorization", format!("Bearer {}", credential));
        }

        builder = match (self.method, &body) {
            (HttpMethod::Get, Value::Object(map)) => builder.query(&query_pairs(&flatten_object(map))),
            (HttpMethod::Get, _) => {
                return Err(DispatchError::new(
                    DispatchErrorKind::Request,
                    "Request format must be a JSON object when using GET",
                ));
            }
            (_, body) => builder.json(body),
        };

        let response = builder
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(endpoint = %self.url, error = %e, "Request exception");
                DispatchError::from_transport(&e)
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::from_transport(&e))?;

        if content_type.starts_with("application/json") {
            let data: Value = serde_json::from_str(&text).map_err(|e| {
                DispatchError::invalid_response(format!("Invalid JSON in response: {}", e))
            })?;
            tracing::info!(status, content_type = %content_type, "Received JSON response");
            self.extract_answer(&data)
        } else {
            tracing::info!(
                status,
                content_type = %content_type,
                content_length = text.len(),
                "Received non-JSON response"
            );
            Ok(text)
        }
    }
}
