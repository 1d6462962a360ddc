//! Static model catalog
//!
//! Selectable models with the output ceilings each provider advertises.

use crate::types::{ModelDescriptor, Provider};

const MODELS: &[(&str, &str, Provider, u32)] = &[
    ("gpt-4o", "GPT 4o", Provider::OpenAi, 4096),
    ("gpt-4-turbo", "GPT 4 Turbo", Provider::OpenAi, 4096),
    ("gpt-3.5-turbo", "GPT 3.5 Turbo", Provider::OpenAi, 4096),
    ("claude-3-opus-20240229", "Claude 3 Opus", Provider::Anthropic, 4096),
    ("claude-3-sonnet-20240229", "Claude 3 Sonnet", Provider::Anthropic, 4096),
    ("claude-3-haiku-20240307", "Claude 3 Haiku", Provider::Anthropic, 4096),
    ("gemini-pro", "Gemini Pro", Provider::Gemini, 8192),
    ("gemini-1.5-flash-latest", "Gemini 1.5 Flash", Provider::Gemini, 8192),
    ("gemini-1.5-pro-latest", "Gemini 1.5 Pro", Provider::Gemini, 8192),
    ("llama3-70b-8192", "LLaMA3 70b", Provider::Groq, 8192),
    ("llama3-8b-8192", "LLaMA3 8b", Provider::Groq, 8192),
    ("mixtral-8x7b-32768", "Mixtral 8x7b", Provider::Groq, 32768),
    ("phi3:latest", "Phi-3", Provider::Ollama, 2048),
    ("llama3:latest", "LLaMA3", Provider::Ollama, 2048),
    ("llmchat", "LLMChat", Provider::LlmChat, 4096),
    ("ixcoach", "IX Coach", Provider::IxCoach, 4096),
];

fn descriptor(&(key, name, provider, max_output_tokens): &(&str, &str, Provider, u32)) -> ModelDescriptor {
    ModelDescriptor {
        key: key.to_string(),
        name: name.to_string(),
        provider,
        max_output_tokens,
    }
}

/// Every model in the catalog
pub fn all() -> Vec<ModelDescriptor> {
    MODELS.iter().map(descriptor).collect()
}

/// Models offered by one provider
pub fn for_provider(provider: Provider) -> Vec<ModelDescriptor> {
    MODELS
        .iter()
        .filter(|m| m.2 == provider)
        .map(descriptor)
        .collect()
}

/// Look up a model by key
pub fn find(key: &str) -> Option<ModelDescriptor> {
    MODELS.iter().find(|m| m.0 == key).map(descriptor)
}

/// Cheapest model to smoke-test a provider's credentials with
pub fn test_model_key(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "gpt-3.5-turbo",
        Provider::Anthropic => "claude-3-haiku-20240307",
        Provider::Gemini => "gemini-pro",
        Provider::Ollama => "phi3:latest",
        Provider::LlmChat => "llmchat",
        Provider::Groq => "llama3-8b-8192",
        Provider::IxCoach => "ixcoach",
    }
}
