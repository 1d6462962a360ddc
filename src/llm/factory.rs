//! Model instantiation.
//!
//! Turns a provider tag, a model descriptor and the caller's preferences into
//! a configured `ChatModel`. Credential and endpoint selection go through the
//! capability table in `profile`.

use super::client::{ChatModel, ClientConfig};
use super::profile::{profile, ProxyPolicy, PROXY_PLACEHOLDER_KEY};
use crate::error::ModelError;
use crate::types::{ModelDescriptor, PreferenceOverrides, Preferences, Provider};
use serde::Deserialize;

/// Last-applied client settings, mirroring constructor props on the client
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOverrides {
    #[serde(default)]
    pub streaming: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Inputs to `ModelService::create_instance`
#[derive(Debug, Clone)]
pub struct CreateInstance {
    pub provider: Provider,
    pub model: ModelDescriptor,
    pub preferences: Option<PreferenceOverrides>,
    pub api_key: Option<String>,
    pub logged_in: bool,
    pub overrides: Option<ClientOverrides>,
}

impl CreateInstance {
    pub fn new(provider: Provider, model: ModelDescriptor) -> Self {
        Self {
            provider,
            model,
            preferences: None,
            api_key: None,
            logged_in: false,
            overrides: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_preferences(mut self, preferences: PreferenceOverrides) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn logged_in(mut self, logged_in: bool) -> Self {
        self.logged_in = logged_in;
        self
    }

    pub fn with_overrides(mut self, overrides: ClientOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Builds provider clients from defaults plus per-call overrides
#[derive(Debug, Clone)]
pub struct ModelService {
    /// Origin proxied clients are pointed at, e.g. `https://chat.ixcoach.com`
    origin: String,
    defaults: Preferences,
}

impl ModelService {
    pub fn new(origin: impl Into<String>, defaults: Preferences) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            defaults,
        }
    }

    /// Origin proxied clients are pointed at, without a trailing slash
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Resolve a configured client for `request.provider`
    pub fn create_instance(&self, request: CreateInstance) -> Result<ChatModel, ModelError> {
        let CreateInstance {
            provider,
            model,
            preferences,
            api_key,
            logged_in,
            overrides,
        } = request;

        let profile = profile(provider);
        let prefs = match &preferences {
            Some(overrides) => self.defaults.merged(overrides),
            None => self.defaults.clone(),
        };

        let max_tokens = prefs.max_tokens.min(model.max_output_tokens);

        let api_key = match profile.proxy {
            ProxyPolicy::Always { key, .. } => Some(key.to_string()),
            ProxyPolicy::WhenLoggedIn { .. } if logged_in => Some(PROXY_PLACEHOLDER_KEY.to_string()),
            _ if profile.needs_caller_key(logged_in) => Some(
                api_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or(ModelError::MissingApiKey(provider.name()))?,
            ),
            _ => None,
        };

        let proxy_path = profile.proxy_path(logged_in);
        let base_url = match proxy_path {
            Some(path) => format!("{}{}", self.origin, path),
            None if profile.public_base_url.is_empty() => prefs.ollama_base_url.clone(),
            None => profile.public_base_url.to_string(),
        };

        let mut config = ClientConfig {
            provider,
            api: profile.api,
            model: model.key.clone(),
            api_key,
            base_url,
            proxied: proxy_path.is_some(),
            streaming: profile.streaming,
            max_retries: profile.max_retries,
            temperature: prefs.temperature,
            max_tokens,
            top_p: profile.supports_top_p.then_some(prefs.top_p),
            top_k: profile.supports_top_k.then_some(prefs.top_k),
            default_headers: profile
                .default_headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        if let Some(overrides) = overrides {
            if let Some(streaming) = overrides.streaming {
                config.streaming = streaming;
            }
            if let Some(max_retries) = overrides.max_retries {
                config.max_retries = max_retries;
            }
            if let Some(base_url) = overrides.base_url {
                config.base_url = base_url;
            }
        }

        log::debug!(
            "Created {} client for {} (proxied: {}, max_tokens: {})",
            provider,
            config.model,
            config.proxied,
            config.max_tokens
        );

        Ok(ChatModel::new(config, model.max_output_tokens))
    }

    /// Same as `create_instance`, parsing the provider from its wire tag
    pub fn create_instance_for_tag(
        &self,
        tag: &str,
        model: ModelDescriptor,
        preferences: Option<PreferenceOverrides>,
        api_key: Option<String>,
        logged_in: bool,
    ) -> Result<ChatModel, ModelError> {
        let provider: Provider = tag.parse()?;
        self.create_instance(CreateInstance {
            provider,
            model,
            preferences,
            api_key,
            logged_in,
            overrides: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::llm::profile::ApiFlavor;

    fn service() -> ModelService {
        ModelService::new("https://chat.ixcoach.com/", Preferences::default())
    }

    fn model(provider: Provider, max_output_tokens: u32) -> ModelDescriptor {
        ModelDescriptor {
            key: catalog::test_model_key(provider).to_string(),
            name: "test".to_string(),
            provider,
            max_output_tokens,
        }
    }

    #[test]
    fn test_origin_is_trimmed() {
        assert_eq!(service().origin(), "https://chat.ixcoach.com");
    }

    #[test]
    fn test_max_tokens_never_exceeds_model_ceiling() {
        let svc = service();
        for provider in Provider::all() {
            for logged_in in [false, true] {
                for requested in [1, 512, 4096, 100_000] {
                    let request = CreateInstance::new(provider, model(provider, 1024))
                        .with_api_key("sk-user")
                        .logged_in(logged_in)
                        .with_preferences(PreferenceOverrides {
                            max_tokens: Some(requested),
                            ..Default::default()
                        });
                    let config = svc.create_instance(request).unwrap().into_config();
                    assert!(config.max_tokens <= 1024, "{} produced {}", provider, config.max_tokens);
                    assert_eq!(config.max_tokens, requested.min(1024));
                }
            }
        }
    }

    #[test]
    fn test_openai_logged_in_uses_proxy() {
        let config = service()
            .create_instance(
                CreateInstance::new(Provider::OpenAi, model(Provider::OpenAi, 4096))
                    .with_api_key("sk-user")
                    .logged_in(true),
            )
            .unwrap()
            .into_config();

        assert_eq!(config.base_url, "https://chat.ixcoach.com/api/ixcoach/");
        assert_eq!(config.api_key.as_deref(), Some(PROXY_PLACEHOLDER_KEY));
        assert!(config.proxied);
    }

    #[test]
    fn test_openai_logged_out_uses_caller_key() {
        let config = service()
            .create_instance(
                CreateInstance::new(Provider::OpenAi, model(Provider::OpenAi, 4096)).with_api_key("sk-user"),
            )
            .unwrap()
            .into_config();

        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-user"));
        assert!(!config.proxied);
        assert!(config.streaming);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.top_k, None);
    }

    #[test]
    fn test_anthropic_logged_in_uses_anthropic_proxy() {
        let config = service()
            .create_instance(
                CreateInstance::new(Provider::Anthropic, model(Provider::Anthropic, 4096)).logged_in(true),
            )
            .unwrap()
            .into_config();

        assert_eq!(config.base_url, "https://chat.ixcoach.com/api/ixcoach/anthropic");
        assert_eq!(config.api, ApiFlavor::Anthropic);
        assert_eq!(
            config.default_headers.get("anthropic-dangerous-direct-browser-access").map(String::as_str),
            Some("true")
        );
        assert_eq!(config.top_k, Some(5));
    }

    #[test]
    fn test_llmchat_always_proxied() {
        let config = service()
            .create_instance(CreateInstance::new(Provider::LlmChat, model(Provider::LlmChat, 4096)))
            .unwrap()
            .into_config();

        assert_eq!(config.base_url, "https://chat.ixcoach.com/api/llmchat/");
        assert_eq!(config.api_key.as_deref(), Some("llmchat"));
    }

    #[test]
    fn test_ollama_uses_preference_base_url() {
        let config = service()
            .create_instance(
                CreateInstance::new(Provider::Ollama, model(Provider::Ollama, 2048)).with_preferences(
                    PreferenceOverrides {
                        ollama_base_url: Some("http://gpu-box:11434".to_string()),
                        ..Default::default()
                    },
                ),
            )
            .unwrap()
            .into_config();

        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.api_key, None);
        assert!(!config.streaming);
    }

    #[test]
    fn test_gemini_retries_once() {
        let config = service()
            .create_instance(CreateInstance::new(Provider::Gemini, model(Provider::Gemini, 8192)).with_api_key("g-key"))
            .unwrap()
            .into_config();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.top_p, Some(1.0));
    }

    #[test]
    fn test_groq_logged_in_still_needs_key() {
        let err = service()
            .create_instance(CreateInstance::new(Provider::Groq, model(Provider::Groq, 8192)).logged_in(true))
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey("groq")));
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let err = service()
            .create_instance_for_tag("mistral", model(Provider::OpenAi, 4096), None, Some("k".into()), false)
            .err()
            .expect("unknown provider must fail");
        assert!(matches!(err, ModelError::UnknownProvider(_)));
    }

    #[test]
    fn test_overrides_apply_last() {
        let config = service()
            .create_instance(
                CreateInstance::new(Provider::OpenAi, model(Provider::OpenAi, 4096))
                    .with_api_key("sk-user")
                    .with_overrides(ClientOverrides {
                        streaming: Some(false),
                        max_retries: Some(0),
                        base_url: Some("http://localhost:8080/v1".to_string()),
                    }),
            )
            .unwrap()
            .into_config();

        assert!(!config.streaming);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }
}
