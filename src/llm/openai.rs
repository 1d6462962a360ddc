//! OpenAI-compatible chat completions.
//!
//! Spoken by OpenAI, Groq and the same-origin `llmchat` / `ixcoach` proxies.

use super::client::ClientConfig;
use super::types::{CompletionResponse, Message, Usage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub(crate) fn endpoint(config: &ClientConfig) -> String {
    format!("{}/chat/completions", config.base_url.trim_end_matches('/'))
}

pub(crate) fn request_body(config: &ClientConfig, messages: &[Message]) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: messages.iter().map(ApiMessage::from).collect(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        top_p: config.top_p,
        stream: false,
    }
}

pub(crate) fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse chat completion response")?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .context("No choices returned")?;

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        usage: response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default(),
    })
}

// -----------------------------------------------------------------------------
// DTOs
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
