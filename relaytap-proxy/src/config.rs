use std::path::Path;

use relaytap_net::Limits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_PORT: u16 = 8000;
pub const DEFAULT_LOCAL_REPLY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    pub listen: ListenConfig,
    /// Decode gzip and deflate bodies before handing captures out.
    pub decompress: bool,
    pub limits: ParserLimits,
    /// How long a local request waits for the embedder's reply before it is
    /// answered with 404.
    pub local_reply_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: PortSelection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PortSelection {
    /// Bind exactly this port. `0` lets the OS choose.
    Fixed(u16),
    /// Probe upward from `base` until a port binds.
    Auto { base: u16 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserLimits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ProxyConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            decompress: true,
            limits: ParserLimits::default(),
            local_reply_timeout_ms: DEFAULT_LOCAL_REPLY_TIMEOUT_MS,
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: PortSelection::Auto {
                base: DEFAULT_BASE_PORT,
            },
        }
    }
}

impl Default for ParserLimits {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }
}

impl From<ParserLimits> for Limits {
    fn from(limits: ParserLimits) -> Self {
        Limits {
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{
        ConfigError, DEFAULT_BASE_PORT, DEFAULT_LOCAL_REPLY_TIMEOUT_MS, PortSelection, ProxyConfig,
    };

    #[test]
    fn defaults_decompress_and_auto_port() {
        let config = ProxyConfig::default();
        assert!(config.decompress);
        assert_eq!(config.local_reply_timeout_ms, DEFAULT_LOCAL_REPLY_TIMEOUT_MS);
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(
            config.listen.port,
            PortSelection::Auto {
                base: DEFAULT_BASE_PORT
            }
        );
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ProxyConfig::from_toml_str("").unwrap(), ProxyConfig::default());
    }

    #[test]
    fn parses_fixed_port_and_raw_bodies() {
        let config = ProxyConfig::from_toml_str(
            r#"
            decompress = false
            local_reply_timeout_ms = 250

            [listen]
            host = "0.0.0.0"
            port = { fixed = 3128 }
            "#,
        )
        .unwrap();
        assert!(!config.decompress);
        assert_eq!(config.local_reply_timeout_ms, 250);
        assert_eq!(config.listen.host, "0.0.0.0");
        assert_eq!(config.listen.port, PortSelection::Fixed(3128));
    }

    #[test]
    fn parses_auto_port_and_limits() {
        let config = ProxyConfig::from_toml_str(
            r#"
            [listen]
            port = { auto = { base = 55688 } }

            [limits]
            max_body_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.listen.port, PortSelection::Auto { base: 55688 });
        assert_eq!(config.limits.max_body_bytes, 1024);
        assert_eq!(config.limits.max_header_bytes, 64 * 1024);
    }

    #[test]
    fn rejects_bad_types() {
        let err = ProxyConfig::from_toml_str("decompress = \"yes\"").unwrap_err();
        assert_matches!(err, ConfigError::Parse(_));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ProxyConfig::load("/nonexistent/relaytap.toml").unwrap_err();
        assert_matches!(err, ConfigError::Io(_));
    }
}
