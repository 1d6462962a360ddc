//! Server application state

use crate::auth::{HttpAuthApi, SharedAuthApi};
use crate::config::{Config, EnvConfig, Upstreams};
use crate::gate::TransportPolicy;
use crate::llm::ModelService;
use crate::rate_limit::{SharedRateLimiter, SlidingWindowLimiter};
use reqwest::Client;
use std::sync::Arc;

/// Shared application state for all route handlers
pub struct AppState {
    pub models: ModelService,
    /// `None` when no auth API is configured; every session is then signed out
    pub auth: Option<SharedAuthApi>,
    /// `None` when rate limiting is off
    pub limiter: Option<SharedRateLimiter>,
    pub transport_policy: TransportPolicy,
    pub upstreams: Upstreams,
    /// Client used by the proxy routes
    pub http: Client,
}

impl AppState {
    /// Wire up state from the config file and the environment
    pub fn from_config(config: &Config, env: &EnvConfig) -> Self {
        let origin = env
            .public_origin
            .clone()
            .unwrap_or_else(|| config.public_origin.clone());

        let auth = env
            .auth_api_url
            .as_ref()
            .map(|url| Arc::new(HttpAuthApi::new(url.clone())) as SharedAuthApi);

        let limiter = env.rate_limit.as_ref().map(|settings| {
            Arc::new(SlidingWindowLimiter::new(settings.requests, settings.window)) as SharedRateLimiter
        });

        Self {
            models: ModelService::new(origin, config.preferences.clone()),
            auth,
            limiter,
            transport_policy: TransportPolicy::from_fail_open(env.fail_open),
            upstreams: env.upstreams.clone(),
            http: Client::new(),
        }
    }
}
