//! Server configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! name = "orders-api"
//! handler_timeout_ms = 5000   # 0 disables the timeout
//! max_body_bytes = 1048576
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Shown in lifecycle logs.
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,
    /// Larger request bodies are answered with `413`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 18989))
}
fn default_name() -> String {
    "switchyard".into()
}
fn default_handler_timeout_ms() -> u64 {
    30_000
}
fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            name: default_name(),
            handler_timeout_ms: default_handler_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// `None` when `handler_timeout_ms` is zero.
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind.port(), 18989);
        assert_eq!(config.handler_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn fields_override_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:8080"
            name = "orders"
            handler_timeout_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.name, "orders");
        assert_eq!(config.handler_timeout(), None);
        assert_eq!(config.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn malformed_documents_are_config_errors() {
        let err = ServerConfig::from_toml_str("bind = \"not an address\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
        let err = ServerConfig::from_toml_str("handler_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ServerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
    }
}
