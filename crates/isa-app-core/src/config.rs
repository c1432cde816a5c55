// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Endpoint configuration for the assemble service and the simulation channel.
//!
//! Values come from the environment and fall back to local development
//! addresses. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the assemble service base URL.
pub const API_URL_ENV: &str = "ISA_API_URL";
/// Environment variable naming the simulation channel URL.
pub const WS_URL_ENV: &str = "ISA_WS_URL";
/// Local development assemble service.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Local development simulation channel.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/simulate";

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// URL does not use one of the schemes the endpoint accepts.
    #[error("{name} must start with {expected}, got `{value}`")]
    BadScheme {
        /// Which setting was rejected.
        name: &'static str,
        /// Accepted scheme prefixes.
        expected: &'static str,
        /// Offending value.
        value: String,
    },
    /// Serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Where the client talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the assemble service (no trailing path).
    pub api_url: String,
    /// Full URL of the streaming simulation endpoint.
    pub ws_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            ws_url: DEFAULT_WS_URL.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Read [`API_URL_ENV`] and [`WS_URL_ENV`], defaulting missing or empty values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };
        Self {
            api_url: pick(API_URL_ENV, DEFAULT_API_URL),
            ws_url: pick(WS_URL_ENV, DEFAULT_WS_URL),
        }
    }

    /// Replace whichever endpoints are given.
    pub fn with_overrides(mut self, api_url: Option<String>, ws_url: Option<String>) -> Self {
        if let Some(api) = api_url {
            self.api_url = api;
        }
        if let Some(ws) = ws_url {
            self.ws_url = ws;
        }
        self
    }

    /// Check that each endpoint uses a scheme its transport can speak.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("api_url", &self.api_url, &["http://", "https://"], "http:// or https://")?;
        check_scheme("ws_url", &self.ws_url, &["ws://", "wss://"], "ws:// or wss://")?;
        Ok(())
    }

    /// Full URL of the assemble endpoint.
    pub fn assemble_url(&self) -> String {
        format!("{}/assemble", self.api_url.trim_end_matches('/'))
    }

    /// Full URL of the service root probe.
    pub fn info_url(&self) -> String {
        format!("{}/", self.api_url.trim_end_matches('/'))
    }

    /// Pretty JSON rendering, for display.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn check_scheme(
    name: &'static str,
    value: &str,
    accepted: &[&str],
    expected: &'static str,
) -> Result<(), ConfigError> {
    let lower = value.to_ascii_lowercase();
    if accepted.iter().any(|prefix| lower.starts_with(prefix)) {
        Ok(())
    } else {
        Err(ConfigError::BadScheme {
            name,
            expected,
            value: value.to_owned(),
        })
    }
}
