//! Client configuration
//!
//! Defaults match what the reference server expects from a test client;
//! credentials normally come from the environment.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::types::{Logon, SubscriptionLevel};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub client_app_id: String,
    pub client_version: String,
    pub protocol_version_major: u32,
    pub protocol_version_minor: u32,
    /// Ask the server to drop any other session logged in as this user
    pub drop_concurrent_session: bool,
    /// Level requested automatically after a symbol resolves
    pub subscription_level: SubscriptionLevel,
    /// Subscribe to contracts first seen in order-status reports
    pub auto_subscribe_order_contracts: bool,
    /// chrono format of the logon result's base time
    pub base_time_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            client_app_id: "WebApiTest".to_string(),
            client_version: "1.24".to_string(),
            protocol_version_major: 2,
            protocol_version_minor: 90,
            drop_concurrent_session: true,
            subscription_level: SubscriptionLevel::TradesBbaDom,
            auto_subscribe_order_contracts: true,
            base_time_format: "%Y-%m-%dT%H:%M:%S".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid client config")
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Overlay `WEBAPI_HOST`, `WEBAPI_USER` and `WEBAPI_PASSWORD` when set.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("WEBAPI_HOST") {
            self.host = host;
        }
        if let Some(user) = lookup("WEBAPI_USER") {
            self.username = user;
        }
        if let Some(password) = lookup("WEBAPI_PASSWORD") {
            self.password = password;
        }
        self
    }

    pub fn logon(&self, user: &str, password: &str) -> Logon {
        Logon {
            user_name: user.to_string(),
            password: password.to_string(),
            client_app_id: self.client_app_id.clone(),
            client_version: self.client_version.clone(),
            protocol_version_major: self.protocol_version_major,
            protocol_version_minor: self.protocol_version_minor,
            drop_concurrent_session: self.drop_concurrent_session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            host = "wss://api.example.com:443"
            subscription_level = "TRADES_BBA"
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "wss://api.example.com:443");
        assert_eq!(config.subscription_level, SubscriptionLevel::TradesBba);
        assert_eq!(config.client_app_id, "WebApiTest");
        assert_eq!(config.protocol_version_minor, 90);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::default().with_overrides(|key| match key {
            "WEBAPI_USER" => Some("trader".to_string()),
            _ => None,
        });
        assert_eq!(config.username, "trader");
        assert!(config.host.is_empty());
    }

    #[test]
    fn test_logon_fields() {
        let logon = ClientConfig::default().logon("u", "p");
        assert_eq!(logon.client_version, "1.24");
        assert_eq!(logon.protocol_version_major, 2);
        assert!(logon.drop_concurrent_session);
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(ClientConfig::from_toml_str("host = ").is_err());
    }
}
