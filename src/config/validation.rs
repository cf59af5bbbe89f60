//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port nonzero, grace period nonzero)
//! - Check the coordination endpoint parses before any subsystem sees it
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::coord::endpoint::CoordinationEndpoint;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.listen_port must be between 1 and 65535")]
    InvalidListenPort,

    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("coordination.endpoint must be set (host:port[,host:port...])")]
    MissingEndpoint,

    #[error("coordination.endpoint is malformed: {0}")]
    MalformedEndpoint(#[source] crate::coord::endpoint::EndpointParseError),

    #[error("observability.metrics_address is not a valid socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.listen_port == 0 {
        errors.push(ValidationError::InvalidListenPort);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.coordination.endpoint.trim().is_empty() {
        errors.push(ValidationError::MissingEndpoint);
    } else if let Err(e) = config.coordination.endpoint.parse::<CoordinationEndpoint>() {
        errors.push(ValidationError::MalformedEndpoint(e));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
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
