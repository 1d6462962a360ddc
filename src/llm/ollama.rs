//! Ollama `/api/chat`.

use super::client::ClientConfig;
use super::types::{CompletionResponse, Message, Usage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub(crate) fn endpoint(config: &ClientConfig) -> String {
    format!("{}/api/chat", config.base_url.trim_end_matches('/'))
}

pub(crate) fn request_body(config: &ClientConfig, messages: &[Message]) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect(),
        stream: false,
        options: Options {
            temperature: config.temperature,
            num_predict: config.max_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
        },
    }
}

pub(crate) fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse Ollama response")?;

    Ok(CompletionResponse {
        content: response.message.content,
        usage: Usage::new(response.prompt_eval_count, response.eval_count),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}
