//! Error types shared across the gateway

use thiserror::Error;

/// Fatal configuration problems, raised at startup or call time
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl ConfigError {
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            value: value.into(),
        }
    }
}

/// Errors from building a provider client
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model provider: {0}")]
    UnknownProvider(String),

    #[error("{0} requires an API key")]
    MissingApiKey(&'static str),
}
