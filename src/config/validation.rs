//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check listen addresses parse and https has TLS material
//! - Validate value ranges (statuses, sizes, permit counts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::boundary::{ListenAddress, Scheme};
use crate::config::schema::{BridgeConfig, ConcurrencyMode};

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut wants_tls = false;
    for address in &config.server.addresses {
        match address.parse::<ListenAddress>() {
            Ok(parsed) => wants_tls |= parsed.scheme == Scheme::Https,
            Err(e) => errors.push(ValidationError::new("server.addresses", e.to_string())),
        }
    }
    if wants_tls && config.transport.tls.is_none() {
        errors.push(ValidationError::new(
            "transport.tls",
            "https addresses require cert_path and key_path",
        ));
    }

    if config.bridge.concurrency == ConcurrencyMode::Concurrent && config.bridge.max_in_flight == 0 {
        errors.push(ValidationError::new(
            "bridge.max_in_flight",
            "must be at least 1 in concurrent mode",
        ));
    }
    for status in &config.bridge.skip_body_completion {
        if !(100..=599).contains(status) {
            errors.push(ValidationError::new(
                "bridge.skip_body_completion",
                format!("{} is not an HTTP status", status),
            ));
        }
    }

    if config.transport.max_body_size == 0 {
        errors.push(ValidationError::new("transport.max_body_size", "must be greater than 0"));
    }
    if config.transport.response_buffer == 0 {
        errors.push(ValidationError::new("transport.response_buffer", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }
    if let Err(e) = EnvFilter::try_new(&config.observability.log_filter) {
        errors.push(ValidationError::new("observability.log_filter", e.to_string()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&BridgeConfig::default()), Ok(()));
    }

    #[test]
    fn all_errors_are_reported() {
        let mut config = BridgeConfig::default();
        config.server.addresses = vec!["ftp://x:1".into(), "https://0.0.0.0:8443".into()];
        config.bridge.skip_body_completion = vec![400, 42];
        config.transport.max_body_size = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "server.addresses",
                "transport.tls",
                "bridge.skip_body_completion",
                "transport.max_body_size",
            ]
        );
    }

    #[test]
    fn https_with_tls_is_valid() {
        let mut config = BridgeConfig::default();
        config.server.addresses = vec!["https://0.0.0.0:8443".into()];
        config.transport.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn concurrent_needs_permits() {
        let mut config = BridgeConfig::default();
        config.bridge.concurrency = ConcurrencyMode::Concurrent;
        config.bridge.max_in_flight = 0;
        assert_eq!(validate_config(&config).unwrap_err()[0].field, "bridge.max_in_flight");
    }
}
