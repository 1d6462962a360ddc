//! Core data types: providers, model descriptors, preferences, users

use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A hosted (or proxied) LLM backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
    Ollama,
    /// Same-origin proxy backend, always reached through `/api/llmchat/`
    LlmChat,
    /// Same-origin proxy backend, always reached through `/api/ixcoach/`
    IxCoach,
}

impl Provider {
    /// Wire tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::LlmChat => "llmchat",
            Self::IxCoach => "ixcoach",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::OpenAi,
            Self::Anthropic,
            Self::Gemini,
            Self::Groq,
            Self::Ollama,
            Self::LlmChat,
            Self::IxCoach,
        ]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|p| p.name() == tag)
            .ok_or_else(|| ModelError::UnknownProvider(s.to_string()))
    }
}

/// Static metadata for a selectable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub key: String,
    pub name: String,
    pub provider: Provider,
    pub max_output_tokens: u32,
}

/// Generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub ollama_base_url: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            top_p: 1.0,
            top_k: 5,
            max_tokens: 1000,
            ollama_base_url: "http://localhost:11434".to_string(),
        }
    }
}

impl Preferences {
    /// Overlay the fields present in `overrides` on top of `self`
    pub fn merged(&self, overrides: &PreferenceOverrides) -> Self {
        Self {
            temperature: overrides.temperature.unwrap_or(self.temperature),
            top_p: overrides.top_p.unwrap_or(self.top_p),
            top_k: overrides.top_k.unwrap_or(self.top_k),
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            ollama_base_url: overrides
                .ollama_base_url
                .clone()
                .unwrap_or_else(|| self.ollama_base_url.clone()),
        }
    }
}

/// User-supplied preference overrides, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceOverrides {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub ollama_base_url: Option<String>,
}

/// Authenticated user: the auth API's profile plus the token it was fetched with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub profile: serde_json::Value,
    pub token: String,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" Anthropic ".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("ixcoach".parse::<Provider>().unwrap(), Provider::IxCoach);

        let err = "mistral".parse::<Provider>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownProvider(ref tag) if tag == "mistral"));
    }

    #[test]
    fn test_provider_serde_tag() {
        let json = serde_json::to_string(&Provider::LlmChat).unwrap();
        assert_eq!(json, "\"llmchat\"");
        let parsed: Provider = serde_json::from_str("\"groq\"").unwrap();
        assert_eq!(parsed, Provider::Groq);
    }

    #[test]
    fn test_preferences_merge() {
        let defaults = Preferences::default();
        let overrides = PreferenceOverrides {
            temperature: Some(0.9),
            max_tokens: Some(4096),
            ..Default::default()
        };

        let merged = defaults.merged(&overrides);
        assert_eq!(merged.temperature, 0.9);
        assert_eq!(merged.max_tokens, 4096);
        assert_eq!(merged.top_p, defaults.top_p);
        assert_eq!(merged.ollama_base_url, defaults.ollama_base_url);
    }

    #[test]
    fn test_overrides_accept_camel_case() {
        let overrides: PreferenceOverrides =
            serde_json::from_str(r#"{"topK": 40, "ollamaBaseUrl": "http://gpu:11434"}"#).unwrap();
        assert_eq!(overrides.top_k, Some(40));
        assert_eq!(overrides.ollama_base_url.as_deref(), Some("http://gpu:11434"));
        assert_eq!(overrides.temperature, None);
    }

    #[test]
    fn test_user_flattens_profile() {
        let user = User {
            profile: serde_json::json!({ "email": "a@b.c" }),
            token: "tok".to_string(),
            fetched_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["email"], "a@b.c");
        assert_eq!(value["token"], "tok");
    }
}
