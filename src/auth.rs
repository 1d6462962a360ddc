//! Authentication against the external auth API
//!
//! The bearer credential lives in the `token` cookie. It is checked in two
//! places: the request gate asks `auth/validateToken` whether it is still
//! good, and the session hydrates the user profile from `auth/me`.

use crate::types::User;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

pub const TOKEN_COOKIE: &str = "token";

/// Outcome of asking the auth API about a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid,
    /// The auth API could not be reached or its answer could not be read
    TransportError,
}

/// The external auth service
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `GET auth/validateToken`
    async fn validate_token(&self, token: &str) -> Validation;

    /// `GET auth/me`, the opaque user profile
    async fn me(&self, token: &str) -> Result<serde_json::Value>;
}

pub type SharedAuthApi = Arc<dyn AuthApi>;

/// `AuthApi` over HTTP
pub struct HttpAuthApi {
    client: Client,
    /// Base URL ending in `/`
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(token)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn validate_token(&self, token: &str) -> Validation {
        let response = match self.get("auth/validateToken", token).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Token validation error: {}", e);
                return Validation::TransportError;
            }
        };

        let status = response.status();
        log::debug!("Token validation responded {}", status);
        if !status.is_success() {
            return Validation::Invalid;
        }

        match response.text().await {
            Ok(body) if body == "OK" => Validation::Valid,
            Ok(body) => {
                log::debug!("Token validation answered {:?}", body);
                Validation::Invalid
            }
            Err(e) => {
                log::error!("Failed to read token validation response: {}", e);
                Validation::TransportError
            }
        }
    }

    async fn me(&self, token: &str) -> Result<serde_json::Value> {
        let response = self
            .get("auth/me", token)
            .send()
            .await
            .context("Failed to reach auth API")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("auth/me returned {}", status));
        }

        response.json().await.context("Failed to parse user profile")
    }
}

/// Copy shown by the sign-in prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignInPrompt {
    pub title: &'static str,
    pub message: &'static str,
    pub action: &'static str,
    pub footnote: &'static str,
}

pub const SIGN_IN_PROMPT: SignInPrompt = SignInPrompt {
    title: "Join our community!",
    message: "Sign up to unlock your daily free usage limit and receive updates on new features.",
    action: "Sign In",
    footnote: "Login is required to ensure fair usage. However, your chat sessions and API keys will be stored locally in your browser.",
};

/// Per-request view of who is signed in
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    user: Option<User>,
    sign_in_open: bool,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the profile for `token`. Failures are logged and leave the
    /// session signed out.
    pub async fn hydrate(api: &dyn AuthApi, token: Option<&str>) -> Self {
        let mut session = Self::new();
        let Some(token) = token else {
            return session;
        };

        match api.me(token).await {
            Ok(profile) => {
                let profile = if profile.is_object() {
                    profile
                } else {
                    serde_json::json!({ "profile": profile })
                };
                session.user = Some(User {
                    profile,
                    token: token.to_string(),
                    fetched_at: Utc::now(),
                });
            }
            Err(e) => log::error!("Error fetching user data: {:#}", e),
        }

        session
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Ask the front-end to show the sign-in prompt
    pub fn open(&mut self) -> &'static SignInPrompt {
        self.sign_in_open = true;
        &SIGN_IN_PROMPT
    }

    pub fn sign_in_open(&self) -> bool {
        self.sign_in_open
    }

    /// Drop the user and return the `Set-Cookie` value that clears the token
    /// for the domain `hostname` belongs to
    pub fn logout(&mut self, hostname: &str) -> String {
        self.user = None;
        removal_cookie(cookie_domain(hostname))
    }
}

/// Cookie domain for a request hostname
pub fn cookie_domain(hostname: &str) -> &'static str {
    if hostname == "localhost" {
        "localhost"
    } else {
        ".ixcoach.com"
    }
}

/// `Set-Cookie` value that expires the token cookie on `domain`
pub fn removal_cookie(domain: &str) -> String {
    format!(
        "{}=; Domain={}; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        TOKEN_COOKIE, domain
    )
}

/// Read a cookie from the `Cookie` request headers; empty values count as absent
pub fn cookie_from_headers<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// The bearer token carried in the `token` cookie
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    cookie_from_headers(headers, TOKEN_COOKIE)
}

/// Hostname from the `Host` header, without the port
pub fn hostname_from_headers(headers: &HeaderMap) -> Option<&str> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next();
    }
    host.split(':').next()
}
