//! chatgate: one front door for many chat model providers
//!
//! - Model factory resolving provider, preferences and credentials into clients
//! - Token gate and sliding-window rate limit in front of the completion routes
//! - Same-origin proxy that swaps placeholder keys for server credentials
//! - Cookie-backed auth sessions against an external auth API

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod llm;
pub mod proxy;
pub mod rate_limit;
pub mod server;
pub mod types;

pub use auth::{AuthApi, AuthSession, HttpAuthApi, Validation};
pub use config::{Config, EnvConfig};
pub use error::{ConfigError, ModelError};
pub use gate::{decide, GateDecision, TransportPolicy};
pub use llm::{ChatModel, ClientConfig, CreateInstance, LLMProvider, ModelService};
pub use rate_limit::{RateLimiter, SlidingWindowLimiter};
pub use server::{router, run_server, state::AppState};
pub use types::{ModelDescriptor, PreferenceOverrides, Preferences, Provider, User};
