//! Request gate for the chat-completion proxy routes
//!
//! Requests without a token pass; requests with a token pass only if the
//! auth API vouches for it. When rate limiting is on, every gated request
//! is counted first.

use crate::auth::{token_from_headers, Validation};
use crate::rate_limit::RateLimitOutcome;
use crate::server::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Routes the gate runs in front of. These are also the only routes the
/// proxy serves, so server credentials are never reachable ungated.
pub const GATED_ROUTES: &[&str] = &[
    "/api/llmchat/chat/completions",
    "/api/ixcoach/chat/completions",
    "/api/ixcoach/anthropic/v1/messages",
];

/// What to do when the auth API cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPolicy {
    #[default]
    FailClosed,
    FailOpen,
}

impl TransportPolicy {
    pub fn from_fail_open(fail_open: bool) -> Self {
        if fail_open {
            Self::FailOpen
        } else {
            Self::FailClosed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Reject,
}

/// `validation` is `None` when the request carries no token
pub fn decide(validation: Option<Validation>, policy: TransportPolicy) -> GateDecision {
    match validation {
        None | Some(Validation::Valid) => GateDecision::Allow,
        Some(Validation::Invalid) => GateDecision::Reject,
        Some(Validation::TransportError) => match policy {
            TransportPolicy::FailOpen => GateDecision::Allow,
            TransportPolicy::FailClosed => GateDecision::Reject,
        },
    }
}

/// Key requests are counted under: the first forwarded address, else the
/// real-ip header, else one shared bucket
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("anonymous")
        .to_string()
}

pub fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

fn too_many_requests(outcome: &RateLimitOutcome) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "message": "Too Many Requests" })),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(outcome.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(outcome.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(outcome.reset_ms));
    response
}

/// Middleware for the gated routes
pub async fn gate(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    if let Some(limiter) = &state.limiter {
        let identifier = client_identifier(request.headers());
        let outcome = limiter.limit(&identifier).await;
        if !outcome.success {
            log::info!("Rate limited {} on {}", identifier, path);
            return too_many_requests(&outcome);
        }
    }

    let token = token_from_headers(request.headers()).map(str::to_string);
    let validation = match token {
        None => None,
        Some(token) => Some(match &state.auth {
            Some(api) => api.validate_token(&token).await,
            None => {
                log::warn!("Token presented on {} but no auth API is configured", path);
                Validation::TransportError
            }
        }),
    };

    match decide(validation, state.transport_policy) {
        GateDecision::Allow => {
            log::debug!("Gate allowed {} ({:?})", path, validation);
            next.run(request).await
        }
        GateDecision::Reject => {
            log::info!("Gate rejected {} ({:?})", path, validation);
            unauthorized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HeaderName;

    #[test]
    fn test_decide_state_machine() {
        let closed = TransportPolicy::FailClosed;
        assert_eq!(decide(None, closed), GateDecision::Allow);
        assert_eq!(decide(Some(Validation::Valid), closed), GateDecision::Allow);
        assert_eq!(decide(Some(Validation::Invalid), closed), GateDecision::Reject);
        assert_eq!(decide(Some(Validation::TransportError), closed), GateDecision::Reject);
    }

    #[test]
    fn test_fail_open_only_affects_transport_errors() {
        let open = TransportPolicy::from_fail_open(true);
        assert_eq!(decide(Some(Validation::TransportError), open), GateDecision::Allow);
        assert_eq!(decide(Some(Validation::Invalid), open), GateDecision::Reject);
    }

    #[test]
    fn test_client_identifier() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identifier(&headers), "anonymous");

        headers.insert(HeaderName::from_static("x-real-ip"), HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_identifier(&headers), "10.0.0.2");

        headers.insert(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_identifier(&headers), "203.0.113.7");
    }

    #[test]
    fn test_every_proxy_route_is_gated() {
        for (route, _, _) in crate::proxy::PROXY_ROUTES {
            assert!(GATED_ROUTES.contains(route), "{} is not gated", route);
        }
    }
}
