//! Chat-completion wire types shared by the OpenAI- and Azure-style dispatchers.

use crate::error::{DispatchError, DispatchErrorKind};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for chat completion. Azure deployments carry the model in
/// the URL, so `model` is omitted for them.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Response from chat completion. Every level is optional so that callers
/// decide how strict to be about missing content.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, if present.
    pub fn into_first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Send a chat-completion request and decode the envelope.
pub(crate) async fn send_chat(builder: RequestBuilder) -> Result<ChatCompletionResponse, DispatchError> {
    let response = builder
        .send()
        .await
        .map_err(|e| DispatchError::from_transport(&e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| DispatchError::from_transport(&e))?;

    if !status.is_success() {
        // Try to parse as API error
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            return Err(DispatchError::new(
                DispatchErrorKind::HttpStatus,
                format!("API error ({}): {}", status, api_error.error.message),
            ));
        }
        return Err(DispatchError::new(
            DispatchErrorKind::HttpStatus,
            format!("Request failed ({}): {}", status, body),
        ));
    }

    serde_json::from_str(&body).map_err(|e| {
        DispatchError::invalid_response(format!("Failed to parse chat completion response: {}", e))
    })
}
