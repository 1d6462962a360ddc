//! LLM Layer
//!
//! - Provider capability table (wire flavor, endpoints, credentials, proxying)
//! - Model factory turning preferences into configured clients
//! - One wire module per API flavor

pub mod types;
pub mod provider;
pub mod profile;
pub mod client;
pub mod factory;

mod anthropic;
mod gemini;
mod ollama;
mod openai;

// Re-export key types
pub use types::{CompletionResponse, Message, Role, Usage};
pub use provider::{LLMProvider, ModelMetadata};
pub use profile::{profile, ApiFlavor, CredentialStyle, ProviderProfile, ProxyPolicy, PROXY_PLACEHOLDER_KEY};
pub use anthropic::ANTHROPIC_VERSION;
pub use client::{ChatModel, ClientConfig};
pub use factory::{ClientOverrides, CreateInstance, ModelService};
