//! Azure-style chat completion dispatcher.

use super::chat::{ChatCompletionRequest, Message, send_chat};
use super::{DispatchResult, Dispatcher, EndpointKind, redact_headers, with_headers};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Like the OpenAI dispatcher, but authenticates with an `api-key` header,
/// forwards user headers and sends no model field.
pub struct AzureDispatcher {
    client: Client,
    url: String,
    api_key: Option<String>,
    headers: HashMap<String, String>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl AzureDispatcher {
    pub fn new(
        client: Client,
        url: String,
        api_key: Option<String>,
        headers: HashMap<String, String>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            client,
            url,
            api_key: api_key.filter(|k| !k.is_empty()),
            headers,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl Dispatcher for AzureDispatcher {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Azure
    }

    async fn dispatch(&self, question: &str) -> DispatchResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(DispatchError::missing_credential(
                "API key not provided for Azure endpoint.",
            ));
        };

        tracing::debug!(
            endpoint = %self.url,
            headers = ?redact_headers(&self.headers),
            "Querying Azure endpoint"
        );

        let request = ChatCompletionRequest {
            model: None,
            messages: vec![Message::user(question)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let builder = with_headers(self.client.post(&self.url), &self.headers)
            .header("Content-Type", "application/json")
            .header("api-key", api_key)
            .timeout(self.timeout)
            .json(&request);

        let completion = send_chat(builder).await?;
        Ok(completion.into_first_content().unwrap_or_default())
    }
}
