//! Configured chat client.
//!
//! `ClientConfig` is the fully-resolved parameter set the factory produces;
//! `ChatModel` pairs it with an HTTP client and speaks the provider's wire
//! format.

use super::profile::{profile, ApiFlavor, CredentialStyle};
use super::provider::{LLMProvider, ModelMetadata};
use super::types::{CompletionResponse, Message};
use super::{anthropic, gemini, ollama, openai};
use crate::types::Provider;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Delay before the first retry; doubles per attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Backoff stops growing after this many doublings (16s)
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Delay before retry number `attempt` (1-based)
fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.pow(attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS))
}

/// Everything needed to call one model on one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    pub provider: Provider,
    pub api: ApiFlavor,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    /// True when requests go through a same-origin proxy path
    pub proxied: bool,
    pub streaming: bool,
    pub max_retries: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default_headers: BTreeMap<String, String>,
}

/// A provider client built from a `ClientConfig`
#[derive(Debug)]
pub struct ChatModel {
    config: ClientConfig,
    max_output_tokens: u32,
    client: Client,
}

impl ChatModel {
    pub fn new(config: ClientConfig, max_output_tokens: u32) -> Self {
        Self::with_client(config, max_output_tokens, Client::new())
    }

    pub fn with_client(config: ClientConfig, max_output_tokens: u32, client: Client) -> Self {
        Self {
            config,
            max_output_tokens,
            client,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn into_config(self) -> ClientConfig {
        self.config
    }

    fn build_request(&self, messages: &[Message]) -> Result<reqwest::RequestBuilder> {
        let config = &self.config;
        let (url, body) = match config.api {
            ApiFlavor::OpenAi => (
                openai::endpoint(config),
                serde_json::to_value(openai::request_body(config, messages))?,
            ),
            ApiFlavor::Anthropic => (
                anthropic::endpoint(config),
                serde_json::to_value(anthropic::request_body(config, messages))?,
            ),
            ApiFlavor::Gemini => (
                gemini::endpoint(config),
                serde_json::to_value(gemini::request_body(config, messages))?,
            ),
            ApiFlavor::Ollama => (
                ollama::endpoint(config),
                serde_json::to_value(ollama::request_body(config, messages))?,
            ),
        };

        let mut request = self.client.post(url).json(&body);

        if config.api == ApiFlavor::Anthropic {
            request = request.header("anthropic-version", anthropic::ANTHROPIC_VERSION);
        }
        for (name, value) in &config.default_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(key) = &config.api_key {
            request = match profile(config.provider).credential {
                CredentialStyle::Bearer => request.bearer_auth(key),
                CredentialStyle::ApiKeyHeader => request.header("x-api-key", key),
                CredentialStyle::QueryKey => request.query(&[("key", key)]),
                CredentialStyle::None => request,
            };
        }

        Ok(request)
    }

    fn parse(&self, body: &str) -> Result<CompletionResponse> {
        match self.config.api {
            ApiFlavor::OpenAi => openai::parse_response(body),
            ApiFlavor::Anthropic => anthropic::parse_response(body),
            ApiFlavor::Gemini => gemini::parse_response(body),
            ApiFlavor::Ollama => ollama::parse_response(body),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LLMProvider for ChatModel {
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            provider: self.config.provider,
            id: self.config.model.clone(),
            max_output_tokens: self.max_output_tokens,
        }
    }

    async fn completion(&self, messages: &[Message]) -> Result<CompletionResponse> {
        let provider = self.config.provider;
        let mut attempt = 0;

        loop {
            let failure = match self.build_request(messages)?.send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response
                        .text()
                        .await
                        .with_context(|| format!("Failed to read {} response", provider))?;
                    return self.parse(&body);
                }
                Ok(response) => {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    let error = anyhow!("{} API error ({}): {}", provider, status, error_text);
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => anyhow::Error::new(e).context(format!("Failed to send request to {}", provider)),
            };

            if attempt >= self.config.max_retries {
                return Err(failure);
            }
            attempt += 1;
            log::warn!(
                "Failed attempt {}/{} against {}: {:#}",
                attempt,
                self.config.max_retries + 1,
                provider,
                failure
            );
            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }
}
