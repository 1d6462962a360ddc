//! Anthropic Messages API.

use super::client::ClientConfig;
use super::types::{split_system, CompletionResponse, Message, Usage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) fn endpoint(config: &ClientConfig) -> String {
    format!("{}/v1/messages", config.base_url.trim_end_matches('/'))
}

pub(crate) fn request_body(config: &ClientConfig, messages: &[Message]) -> MessagesRequest {
    let (system, turns) = split_system(messages);
    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system,
        messages: turns
            .into_iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
    }
}

pub(crate) fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: MessagesResponse =
        serde_json::from_str(body).context("Failed to parse Anthropic response")?;

    let content: String = response
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect();

    Ok(CompletionResponse {
        content,
        usage: Usage::new(response.usage.input_tokens, response.usage.output_tokens),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let body = r#"{
            "content": [
                { "type": "text", "text": "Hello" },
                { "type": "text", "text": ", world" }
            ],
            "usage": { "input_tokens": 12, "output_tokens": 4 }
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.content, "Hello, world");
        assert_eq!(response.usage, Usage::new(12, 4));
    }
}
