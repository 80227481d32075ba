//! OpenAI-style chat completion dispatcher.

use super::chat::{ChatCompletionRequest, Message, send_chat};
use super::{DispatchResult, Dispatcher, EndpointKind};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Single-attempt POST of a chat-completion body with a bearer credential.
pub struct OpenAiDispatcher {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiDispatcher {
    /// `api_key` is the request's credential, or the configured default.
    pub fn new(client: Client, url: String, api_key: Option<String>, config: &DispatchConfig) -> Self {
        Self {
            client,
            url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
impl Dispatcher for OpenAiDispatcher {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Openai
    }

    async fn dispatch(&self, question: &str) -> DispatchResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(DispatchError::missing_credential(
                "OPENAI_API_KEY not set in environment.",
            ));
        };

        let request = ChatCompletionRequest {
            model: Some(self.model.clone()),
            messages: vec![Message::user(question)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let builder = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request);

        let completion = send_chat(builder).await?;
        completion
            .into_first_content()
            .ok_or_else(|| DispatchError::invalid_response("No choices in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_not_attempted() {
        // Nothing listens on this address; a request would fail differently.
        let dispatcher = OpenAiDispatcher::new(
            Client::new(),
            "http://127.0.0.1:9/v1/chat/completions".to_string(),
            Some(String::new()),
            &DispatchConfig::default(),
        );
        let err = dispatcher.dispatch("Who?").await.unwrap_err();
        assert_eq!(err.kind, crate::error::DispatchErrorKind::MissingCredential);
        assert_eq!(err.sentinel(), "Error: OPENAI_API_KEY not set in environment.");
    }
}
