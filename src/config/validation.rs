//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::{AddrParseError, BackendAddr};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    InvalidListenAddress(String),

    #[error("no backends configured")]
    EmptyBackendPool,

    #[error("backend {name:?}: {source}")]
    InvalidBackendAddress {
        name: String,
        #[source]
        source: AddrParseError,
    },

    #[error("balancer.initial_cursor {cursor} is out of range for {len} backends")]
    CursorOutOfRange { cursor: usize, len: usize },

    #[error("timeouts.connect_ms must be greater than zero")]
    ZeroConnectTimeout,

    #[error("timeouts.half_close_ms must be greater than zero")]
    ZeroHalfCloseGrace,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListenAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::EmptyBackendPool);
    }

    for backend in &config.backends {
        if let Err(source) = backend.address.parse::<BackendAddr>() {
            errors.push(ValidationError::InvalidBackendAddress {
                name: backend.display_name().to_string(),
                source,
            });
        }
    }

    if let Some(cursor) = config.balancer.initial_cursor {
        let len = config.backends.len();
        if len > 0 && cursor >= len {
            errors.push(ValidationError::CursorOutOfRange { cursor, len });
        }
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    if config.timeouts.half_close_ms == 0 {
        errors.push(ValidationError::ZeroHalfCloseGrace);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
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
    use crate::config::BackendConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn empty_pool_is_rejected() {
        let mut config = ProxyConfig::default();
        config.backends.clear();
        config.balancer.initial_cursor = Some(3);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyBackendPool]);
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = ":7878".into();
        config.backends.push(BackendConfig::new("bad", "localhost"));
        config.balancer.initial_cursor = Some(3);
        config.timeouts.connect_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[0], ValidationError::InvalidListenAddress(":7878".into()));
        assert!(matches!(
            errors[1],
            ValidationError::InvalidBackendAddress { ref name, .. } if name == "bad"
        ));
        assert_eq!(errors[2], ValidationError::CursorOutOfRange { cursor: 3, len: 3 });
        assert_eq!(errors[3], ValidationError::ZeroConnectTimeout);
    }

    #[test]
    fn zero_half_close_grace_is_rejected() {
        let err = crate::config::loader::parse_config("[timeouts]\nhalf_close_ms = 0").unwrap_err();
        assert!(matches!(
            err,
            crate::config::ConfigError::Validation(ref errors)
                if errors == &vec![ValidationError::ZeroHalfCloseGrace]
        ));
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidMetricsAddress("nope".into())]);
    }
}
