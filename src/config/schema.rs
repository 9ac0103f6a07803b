//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listen addresses.
    pub server: ServerConfig,

    /// Adapter behaviour (concurrency, deadlines).
    pub bridge: AdapterConfig,

    /// Reference transport settings.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listen addresses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Addresses such as `http://localhost:3001` or `https://0.0.0.0:3443`.
    pub addresses: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// How many exchanges the adapter runs at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One exchange at a time.
    #[default]
    Serialized,
    /// Up to `max_in_flight` exchanges.
    Concurrent,
}

/// Adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub concurrency: ConcurrencyMode,

    /// Permit count when `concurrency = "concurrent"`.
    pub max_in_flight: usize,

    /// Statuses whose body completion is not awaited before returning.
    pub skip_body_completion: Vec<u16>,

    /// Per-request deadline in seconds (0 disables).
    pub request_timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::Serialized,
            max_in_flight: 64,
            skip_body_completion: vec![400],
            request_timeout_secs: 30,
        }
    }
}

/// Reference transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Header carrying the request ID; empty disables generation.
    pub request_id_header: String,

    /// Response fragments queued per exchange before the bridge waits.
    pub response_buffer: usize,

    /// Time allowed for in-flight exchanges after stop, in seconds.
    pub shutdown_grace_secs: u64,

    /// Certificate for `https` addresses.
    pub tls: Option<TlsConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024,
            request_id_header: "x-request-id".to_string(),
            response_buffer: 16,
            shutdown_grace_secs: 10,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub log_filter: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "http_bridge=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.addresses, vec!["http://localhost:3001".to_string()]);
        assert_eq!(config.bridge.concurrency, ConcurrencyMode::Serialized);
        assert_eq!(config.bridge.skip_body_completion, vec![400]);
        assert_eq!(config.bridge.request_timeout_secs, 30);
        assert!(config.transport.tls.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [server]
            addresses = ["http://0.0.0.0:8080", "https://0.0.0.0:8443"]

            [bridge]
            concurrency = "concurrent"
            max_in_flight = 8
            skip_body_completion = []

            [transport.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [observability]
            log_format = "compact"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.addresses.len(), 2);
        assert_eq!(config.bridge.concurrency, ConcurrencyMode::Concurrent);
        assert_eq!(config.bridge.max_in_flight, 8);
        assert!(config.bridge.skip_body_completion.is_empty());
        assert_eq!(config.transport.tls.unwrap().cert_path, "cert.pem");
        assert_eq!(config.observability.log_format, LogFormat::Compact);
        assert_eq!(config.transport.max_body_size, 10 * 1024 * 1024);
    }
}
