//! Provider capability table.
//!
//! Every per-provider decision the factory and the proxy make (wire format,
//! where requests go, how credentials are presented, which sampling knobs
//! apply) is looked up here rather than branched on at each call site.

use crate::types::Provider;
use serde::Serialize;

/// Placeholder key handed to proxied clients; the proxy swaps in the real one
pub const PROXY_PLACEHOLDER_KEY: &str = "ixcoach";

/// Request/response format spoken by a provider's chat endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

/// How a credential is attached to upstream requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>`
    ApiKeyHeader,
    /// `?key=<key>` query parameter
    QueryKey,
    /// No credential
    None,
}

/// When client traffic is routed through a same-origin proxy path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyPolicy {
    Never,
    /// Authenticated callers use the proxy with the placeholder key
    WhenLoggedIn { path: &'static str },
    /// Always proxied, always with this fixed key
    Always { path: &'static str, key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderProfile {
    pub provider: Provider,
    pub api: ApiFlavor,
    /// Public endpoint; empty when the provider only exists behind a proxy
    /// or takes its base URL from preferences
    pub public_base_url: &'static str,
    pub credential: CredentialStyle,
    pub proxy: ProxyPolicy,
    pub streaming: bool,
    pub max_retries: u32,
    pub supports_top_p: bool,
    pub supports_top_k: bool,
    pub default_headers: &'static [(&'static str, &'static str)],
}

impl ProviderProfile {
    /// Whether a key must come from the caller for this login state
    pub fn needs_caller_key(&self, logged_in: bool) -> bool {
        if self.credential == CredentialStyle::None {
            return false;
        }
        match self.proxy {
            ProxyPolicy::Never => true,
            ProxyPolicy::WhenLoggedIn { .. } => !logged_in,
            ProxyPolicy::Always { .. } => false,
        }
    }

    /// Proxy path in effect for this login state, if any
    pub fn proxy_path(&self, logged_in: bool) -> Option<&'static str> {
        match self.proxy {
            ProxyPolicy::Never => None,
            ProxyPolicy::WhenLoggedIn { path } => logged_in.then_some(path),
            ProxyPolicy::Always { path, .. } => Some(path),
        }
    }
}

const ANTHROPIC_BROWSER_HEADERS: &[(&str, &str)] =
    &[("anthropic-dangerous-direct-browser-access", "true")];

const PROFILES: &[ProviderProfile] = &[
    ProviderProfile {
        provider: Provider::OpenAi,
        api: ApiFlavor::OpenAi,
        public_base_url: "https://api.openai.com/v1",
        credential: CredentialStyle::Bearer,
        proxy: ProxyPolicy::WhenLoggedIn { path: "/api/ixcoach/" },
        streaming: true,
        max_retries: 2,
        supports_top_p: true,
        supports_top_k: false,
        default_headers: &[],
    },
    ProviderProfile {
        provider: Provider::Anthropic,
        api: ApiFlavor::Anthropic,
        public_base_url: "https://api.anthropic.com",
        credential: CredentialStyle::ApiKeyHeader,
        proxy: ProxyPolicy::WhenLoggedIn { path: "/api/ixcoach/anthropic" },
        streaming: true,
        max_retries: 2,
        supports_top_p: true,
        supports_top_k: true,
        default_headers: ANTHROPIC_BROWSER_HEADERS,
    },
    ProviderProfile {
        provider: Provider::Gemini,
        api: ApiFlavor::Gemini,
        public_base_url: "https://generativelanguage.googleapis.com",
        credential: CredentialStyle::QueryKey,
        proxy: ProxyPolicy::Never,
        streaming: true,
        max_retries: 1,
        supports_top_p: true,
        supports_top_k: true,
        default_headers: &[],
    },
    ProviderProfile {
        provider: Provider::Groq,
        api: ApiFlavor::OpenAi,
        public_base_url: "https://api.groq.com/openai/v1",
        credential: CredentialStyle::Bearer,
        proxy: ProxyPolicy::Never,
        streaming: true,
        max_retries: 2,
        supports_top_p: false,
        supports_top_k: false,
        default_headers: &[],
    },
    ProviderProfile {
        provider: Provider::Ollama,
        api: ApiFlavor::Ollama,
        public_base_url: "",
        credential: CredentialStyle::None,
        proxy: ProxyPolicy::Never,
        streaming: false,
        max_retries: 2,
        supports_top_p: true,
        supports_top_k: true,
        default_headers: &[],
    },
    ProviderProfile {
        provider: Provider::LlmChat,
        api: ApiFlavor::OpenAi,
        public_base_url: "",
        credential: CredentialStyle::Bearer,
        proxy: ProxyPolicy::Always { path: "/api/llmchat/", key: "llmchat" },
        streaming: true,
        max_retries: 2,
        supports_top_p: true,
        supports_top_k: false,
        default_headers: &[],
    },
    ProviderProfile {
        provider: Provider::IxCoach,
        api: ApiFlavor::OpenAi,
        public_base_url: "",
        credential: CredentialStyle::Bearer,
        proxy: ProxyPolicy::Always { path: "/api/ixcoach/", key: PROXY_PLACEHOLDER_KEY },
        streaming: true,
        max_retries: 2,
        supports_top_p: true,
        supports_top_k: false,
        default_headers: &[],
    },
];

/// Capability profile for a provider
pub fn profile(provider: Provider) -> &'static ProviderProfile {
    PROFILES
        .iter()
        .find(|p| p.provider == provider)
        .unwrap_or_else(|| unreachable!("every provider has a profile"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_provider_has_a_profile() {
        for provider in Provider::all() {
            assert_eq!(profile(provider).provider, provider);
        }
        assert_eq!(PROFILES.len(), Provider::all().len());
    }

    #[test]
    fn test_proxy_path_by_login_state() {
        let openai = profile(Provider::OpenAi);
        assert_eq!(openai.proxy_path(false), None);
        assert_eq!(openai.proxy_path(true), Some("/api/ixcoach/"));
        assert!(openai.needs_caller_key(false));
        assert!(!openai.needs_caller_key(true));

        let llmchat = profile(Provider::LlmChat);
        assert_eq!(llmchat.proxy_path(false), Some("/api/llmchat/"));
        assert!(!llmchat.needs_caller_key(false));

        let groq = profile(Provider::Groq);
        assert_eq!(groq.proxy_path(true), None);
        assert!(groq.needs_caller_key(true));

        assert!(!profile(Provider::Ollama).needs_caller_key(false));
    }
}
