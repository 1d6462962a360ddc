//! The Provider Abstraction.
//!
//! Any chat backend the gateway can talk to, whatever its wire format.

use super::types::{CompletionResponse, Message};
use crate::types::Provider;
use anyhow::Result;
use async_trait::async_trait;

/// What a configured client is pointed at.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub provider: Provider,
    pub id: String,
    pub max_output_tokens: u32,
}

/// The core trait for LLM interactions.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn metadata(&self) -> ModelMetadata;

    /// Send a one-shot chat completion request.
    async fn completion(&self, messages: &[Message]) -> Result<CompletionResponse>;
}
