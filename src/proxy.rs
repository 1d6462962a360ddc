//! Same-origin reverse proxy to the real provider APIs
//!
//! Signed-in browsers hold a placeholder key and send their chat traffic to
//! `/api/ixcoach/...` or `/api/llmchat/...`; this module swaps in the
//! server's own credentials and relays the upstream response as it streams.

use crate::config::Upstreams;
use crate::llm::{profile, CredentialStyle, ANTHROPIC_VERSION};
use crate::server::state::AppState;
use crate::types::Provider;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Upper bound on a proxied request body
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Completion endpoints the proxy relays, with their upstream path. Anything
/// else under the proxy prefixes never reaches the server credentials.
pub const PROXY_ROUTES: &[(&str, Provider, &str)] = &[
    ("/api/ixcoach/anthropic/v1/messages", Provider::Anthropic, "v1/messages"),
    ("/api/ixcoach/chat/completions", Provider::OpenAi, "chat/completions"),
    ("/api/llmchat/chat/completions", Provider::LlmChat, "chat/completions"),
];

/// Request headers relayed upstream; everything else (cookies, the
/// placeholder credential, hop-by-hop headers) is dropped
const FORWARDED_REQUEST_HEADERS: &[&str] = &["content-type", "accept", "user-agent"];

const FORWARDED_RESPONSE_HEADERS: &[&str] = &["content-type", "cache-control"];

/// Where a proxied request goes and how it authenticates
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyTarget {
    pub provider: Provider,
    pub url: String,
    pub credential: CredentialStyle,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProxyError {
    UnknownRoute,
    NotConfigured(&'static str),
}

/// Map a same-origin path to its upstream
pub fn resolve(path: &str, upstreams: &Upstreams) -> Result<ProxyTarget, ProxyError> {
    let (provider, rest) = PROXY_ROUTES
        .iter()
        .find(|(route, _, _)| *route == path)
        .map(|&(_, provider, rest)| (provider, rest))
        .ok_or(ProxyError::UnknownRoute)?;

    let (base, key, key_name) = match provider {
        Provider::Anthropic => (
            upstreams
                .anthropic_base_url
                .as_deref()
                .unwrap_or(profile(Provider::Anthropic).public_base_url),
            &upstreams.anthropic_api_key,
            "ANTHROPIC_API_KEY",
        ),
        Provider::LlmChat => (
            upstreams
                .llmchat_api_url
                .as_deref()
                .ok_or(ProxyError::NotConfigured("LLMCHAT_API_URL"))?,
            &upstreams.llmchat_api_key,
            "LLMCHAT_API_KEY",
        ),
        _ => (
            upstreams
                .openai_base_url
                .as_deref()
                .unwrap_or(profile(Provider::OpenAi).public_base_url),
            &upstreams.openai_api_key,
            "OPENAI_API_KEY",
        ),
    };

    let api_key = key.clone().ok_or(ProxyError::NotConfigured(key_name))?;

    Ok(ProxyTarget {
        provider,
        url: format!("{}/{}", base.trim_end_matches('/'), rest),
        credential: profile(provider).credential,
        api_key,
    })
}

fn upstream_headers(incoming: &HeaderMap, target: &ProxyTarget) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &name in FORWARDED_REQUEST_HEADERS {
        for value in incoming.get_all(name) {
            headers.append(HeaderName::from_static(name), value.clone());
        }
    }

    if target.provider == Provider::Anthropic {
        let version = incoming
            .get("anthropic-version")
            .cloned()
            .unwrap_or_else(|| header::HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert("anthropic-version", version);
        if let Some(beta) = incoming.get("anthropic-beta") {
            headers.insert("anthropic-beta", beta.clone());
        }
    }

    headers
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Relay a request to its upstream with the server's credentials
pub async fn forward(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let path = request.uri().path().to_string();

    let target = match resolve(&path, &state.upstreams) {
        Ok(target) => target,
        Err(ProxyError::UnknownRoute) => return error_response(StatusCode::NOT_FOUND, "Unknown proxy route"),
        Err(ProxyError::NotConfigured(name)) => {
            log::warn!("[{}] {} is not configured; cannot proxy {}", request_id, name, path);
            return error_response(StatusCode::SERVICE_UNAVAILABLE, format!("{} is not configured", name));
        }
    };

    let url = match request.uri().query() {
        Some(query) => format!("{}?{}", target.url, query),
        None => target.url.clone(),
    };
    let method = request.method().clone();
    let headers = upstream_headers(request.headers(), &target);

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
    };

    let mut upstream = state.http.request(method.clone(), url.as_str()).headers(headers).body(body);
    upstream = match target.credential {
        CredentialStyle::Bearer => upstream.bearer_auth(&target.api_key),
        CredentialStyle::ApiKeyHeader => upstream.header("x-api-key", &target.api_key),
        CredentialStyle::QueryKey => upstream.query(&[("key", &target.api_key)]),
        CredentialStyle::None => upstream,
    };

    let response = match upstream.send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("[{}] {} {} -> {} failed: {}", request_id, method, path, target.provider, e);
            return error_response(StatusCode::BAD_GATEWAY, format!("Upstream request failed: {}", e));
        }
    };

    let status = response.status();
    log::info!("[{}] {} {} -> {} {}", request_id, method, path, target.provider, status);

    let mut relayed = Response::builder().status(status);
    for &name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = response.headers().get(name) {
            relayed = relayed.header(name, value);
        }
    }

    relayed
        .body(Body::from_stream(response.bytes_stream()))
        .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstreams() -> Upstreams {
        Upstreams {
            openai_api_key: Some("sk-openai".to_string()),
            anthropic_api_key: Some("sk-ant".to_string()),
            llmchat_api_url: Some("https://llm.internal/v1/".to_string()),
            llmchat_api_key: Some("sk-llm".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_openai() {
        let target = resolve("/api/ixcoach/chat/completions", &upstreams()).unwrap();
        assert_eq!(target.provider, Provider::OpenAi);
        assert_eq!(target.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(target.credential, CredentialStyle::Bearer);
        assert_eq!(target.api_key, "sk-openai");
    }

    #[test]
    fn test_resolve_anthropic_before_openai() {
        let target = resolve("/api/ixcoach/anthropic/v1/messages", &upstreams()).unwrap();
        assert_eq!(target.provider, Provider::Anthropic);
        assert_eq!(target.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(target.credential, CredentialStyle::ApiKeyHeader);
    }

    #[test]
    fn test_resolve_llmchat() {
        let target = resolve("/api/llmchat/chat/completions", &upstreams()).unwrap();
        assert_eq!(target.url, "https://llm.internal/v1/chat/completions");
        assert_eq!(target.api_key, "sk-llm");
    }

    #[test]
    fn test_resolve_only_completion_endpoints() {
        for path in [
            "/api/ixcoachx/chat/completions",
            "/api/ixcoach/files",
            "/api/ixcoach/v1/images/generations",
            "/api/ixcoach/anthropic/v1/models",
            "/api/ixcoach/anthropicx",
            "/api/llmchat/embeddings",
            "/api/ixcoach/chat/completions/extra",
        ] {
            assert_eq!(resolve(path, &upstreams()), Err(ProxyError::UnknownRoute), "{}", path);
        }
    }

    #[test]
    fn test_resolve_missing_credentials() {
        let err = resolve("/api/ixcoach/chat/completions", &Upstreams::default()).unwrap_err();
        assert_eq!(err, ProxyError::NotConfigured("OPENAI_API_KEY"));

        let err = resolve("/api/llmchat/chat/completions", &Upstreams::default()).unwrap_err();
        assert_eq!(err, ProxyError::NotConfigured("LLMCHAT_API_URL"));
    }

    #[test]
    fn test_upstream_headers_drop_credentials() {
        let mut incoming = HeaderMap::new();
        incoming.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        incoming.insert(header::AUTHORIZATION, "Bearer ixcoach".parse().unwrap());
        incoming.insert(header::COOKIE, "token=abc".parse().unwrap());

        let target = resolve("/api/ixcoach/anthropic/v1/messages", &upstreams()).unwrap();
        let headers = upstream_headers(&incoming, &target);

        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert!(headers.get(header::COOKIE).is_none());
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
    }
}
