//! Google Gemini `generateContent`.

use super::client::ClientConfig;
use super::types::{split_system, CompletionResponse, Message, Role, Usage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Endpoint without the key; the key is attached as a query parameter.
pub(crate) fn endpoint(config: &ClientConfig) -> String {
    format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        config.model
    )
}

pub(crate) fn request_body(config: &ClientConfig, messages: &[Message]) -> GenerateRequest {
    let (system, turns) = split_system(messages);
    GenerateRequest {
        system_instruction: system.map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        }),
        contents: turns
            .into_iter()
            .map(|m| Content {
                role: Some(if m.role == Role::Assistant { "model" } else { "user" }),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect(),
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
        },
    }
}

pub(crate) fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: GenerateResponse =
        serde_json::from_str(body).context("Failed to parse Gemini response")?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("No candidates returned from Gemini")?;

    let content = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default();

    let usage = response
        .usage_metadata
        .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    Ok(CompletionResponse { content, usage })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "42" }] } }],
            "usageMetadata": { "promptTokenCount": 5, "candidatesTokenCount": 1 }
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.content, "42");
        assert_eq!(response.usage.total_tokens, 6);
    }
}
