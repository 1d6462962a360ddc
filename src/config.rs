//! Configuration management for chatgate
//!
//! Two layers: a TOML file holding default generation preferences and the
//! public origin, and environment variables that switch on the request gate
//! and name the upstream services.

use crate::error::ConfigError;
use crate::rate_limit::parse_window;
use crate::types::Preferences;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// chatgate configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Default generation preferences, overridden per request
    #[serde(default)]
    pub preferences: Preferences,
    /// Origin the browser reaches this server at; proxied clients point here
    #[serde(default = "default_origin")]
    pub public_origin: String,
    /// Version of config schema (for future migrations)
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferences: Preferences::default(),
            public_origin: default_origin(),
            version: 1,
        }
    }
}

impl Config {
    /// Get the config file path (~/.chatgate/config.toml)
    pub fn path() -> Result<PathBuf> {
        Ok(chatgate_dir()?.join("config.toml"))
    }

    /// Load config from disk, or return None if it doesn't exist
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the base chatgate directory path (~/.chatgate)
pub fn chatgate_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".chatgate"))
}

/// Sliding-window rate limit settings
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    pub requests: u32,
    pub window: Duration,
}

/// Server-side credentials for the same-origin proxy routes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Upstreams {
    pub openai_api_key: Option<String>,
    /// Overrides the public OpenAI endpoint
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    /// Overrides the public Anthropic endpoint
    pub anthropic_base_url: Option<String>,
    pub llmchat_api_url: Option<String>,
    pub llmchat_api_key: Option<String>,
}

/// Settings read from the process environment
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub enable_auth: bool,
    /// Present only when `enable_auth` is set
    pub rate_limit: Option<RateLimitSettings>,
    /// Base URL of the auth API, with trailing slash (`{url}auth/me`)
    pub auth_api_url: Option<String>,
    /// Let requests through when the auth API cannot be reached
    pub fail_open: bool,
    pub public_origin: Option<String>,
    pub upstreams: Upstreams,
}

impl EnvConfig {
    /// Read from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; missing required values are fatal
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| get(key).map(|v| v == "true").unwrap_or(false);

        let enable_auth = flag("NEXT_PUBLIC_ENABLE_AUTH");
        let auth_api_url = get("NEXT_PUBLIC_IX_API_URL").map(with_trailing_slash);

        let rate_limit = if enable_auth {
            let requests = get("RATE_LIMIT_REQUESTS").ok_or(ConfigError::Missing("RATE_LIMIT_REQUESTS"))?;
            let window = get("RATE_LIMIT_WINDOW").ok_or(ConfigError::Missing("RATE_LIMIT_WINDOW"))?;
            let requests: u32 = requests
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("RATE_LIMIT_REQUESTS", requests.clone()))?;
            if requests == 0 {
                return Err(ConfigError::invalid("RATE_LIMIT_REQUESTS", "0"));
            }
            let window = parse_window(&window)?;

            if auth_api_url.is_none() {
                return Err(ConfigError::Missing("NEXT_PUBLIC_IX_API_URL"));
            }

            Some(RateLimitSettings { requests, window })
        } else {
            None
        };

        Ok(Self {
            enable_auth,
            rate_limit,
            auth_api_url,
            fail_open: flag("AUTH_VALIDATION_FAIL_OPEN"),
            public_origin: get("PUBLIC_ORIGIN"),
            upstreams: Upstreams {
                openai_api_key: get("OPENAI_API_KEY"),
                openai_base_url: get("OPENAI_BASE_URL"),
                anthropic_api_key: get("ANTHROPIC_API_KEY"),
                anthropic_base_url: get("ANTHROPIC_BASE_URL"),
                llmchat_api_url: get("LLMCHAT_API_URL"),
                llmchat_api_key: get("LLMCHAT_API_KEY"),
            },
        })
    }
}

fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{}/", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.public_origin, "http://localhost:3000");
        assert_eq!(config.preferences, Preferences::default());
    }

    #[test]
    fn test_config_file_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(Config::load_from(&path).unwrap().is_none());

        let mut config = Config::default();
        config.preferences.max_tokens = 2048;
        config.public_origin = "https://chat.ixcoach.com".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "public_origin = \"https://example.com\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.public_origin, "https://example.com");
        assert_eq!(loaded.preferences, Preferences::default());
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn test_env_auth_disabled_needs_nothing() {
        let env = EnvConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!env.enable_auth);
        assert!(env.rate_limit.is_none());
        assert!(env.auth_api_url.is_none());
        assert!(!env.fail_open);
    }

    #[test]
    fn test_env_auth_enabled_requires_rate_limit() {
        let err = EnvConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_ENABLE_AUTH", "true"),
            ("RATE_LIMIT_WINDOW", "10 s"),
            ("NEXT_PUBLIC_IX_API_URL", "https://api.ixcoach.com/"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("RATE_LIMIT_REQUESTS")));

        let err = EnvConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_ENABLE_AUTH", "true"),
            ("RATE_LIMIT_REQUESTS", "10"),
            ("NEXT_PUBLIC_IX_API_URL", "https://api.ixcoach.com/"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("RATE_LIMIT_WINDOW")));
    }

    #[test]
    fn test_env_auth_enabled_requires_api_url() {
        let err = EnvConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_ENABLE_AUTH", "true"),
            ("RATE_LIMIT_REQUESTS", "10"),
            ("RATE_LIMIT_WINDOW", "10 s"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("NEXT_PUBLIC_IX_API_URL")));
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let err = EnvConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_ENABLE_AUTH", "true"),
            ("RATE_LIMIT_REQUESTS", "lots"),
            ("RATE_LIMIT_WINDOW", "10 s"),
            ("NEXT_PUBLIC_IX_API_URL", "https://api.ixcoach.com/"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RATE_LIMIT_REQUESTS", .. }));
    }

    #[test]
    fn test_env_full() {
        let env = EnvConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_ENABLE_AUTH", "true"),
            ("RATE_LIMIT_REQUESTS", "20"),
            ("RATE_LIMIT_WINDOW", "1 m"),
            ("NEXT_PUBLIC_IX_API_URL", "https://api.ixcoach.com"),
            ("OPENAI_API_KEY", "sk-server"),
            ("AUTH_VALIDATION_FAIL_OPEN", "true"),
        ]))
        .unwrap();

        assert!(env.enable_auth);
        assert!(env.fail_open);
        assert_eq!(
            env.rate_limit,
            Some(RateLimitSettings {
                requests: 20,
                window: Duration::from_secs(60)
            })
        );
        assert_eq!(env.auth_api_url.as_deref(), Some("https://api.ixcoach.com/"));
        assert_eq!(env.upstreams.openai_api_key.as_deref(), Some("sk-server"));
        assert!(env.upstreams.anthropic_api_key.is_none());
    }
}
