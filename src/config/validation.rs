//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (overrides reference known paths)
//! - Validate value ranges (latency, statuses, TTLs, hop limit)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MockConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::catalog::{Catalog, CatalogError};
use crate::config::schema::{LatencyRange, MockConfig};
use crate::routing::context::TOKEN_PATH;
use crate::token::MAX_TTL_SECS;

/// A semantic problem in an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{context}: min_ms {min} exceeds max_ms {max}")]
    LatencyRange { context: String, min: u64, max: u64 },

    #[error("override '{path}': {status} is not an HTTP status code")]
    Status { path: String, status: u16 },

    #[error("override '{path}': probability {probability} is outside 0..=1")]
    Probability { path: String, probability: f64 },

    #[error("override '{path}': probability needs a status to apply to")]
    ProbabilityWithoutStatus { path: String },

    #[error("override '{0}' references an unknown path")]
    UnknownOverridePath(String),

    #[error("imds.hop_limit {0} is outside 1..=64")]
    HopLimit(u8),

    #[error("imds.max_token_ttl_secs {0} is outside 1..={MAX_TTL_SECS}")]
    MaxTokenTtl(u64),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn check_latency(errors: &mut Vec<ValidationError>, context: &str, range: &LatencyRange) {
    if range.min_ms > range.max_ms {
        errors.push(ValidationError::LatencyRange {
            context: context.to_string(),
            min: range.min_ms,
            max: range.max_ms,
        });
    }
}

/// Validate a folded configuration.
pub fn validate_config(config: &MockConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.grace_period_secs == 0 {
        errors.push(ValidationError::Zero("server.grace_period_secs"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("server.request_timeout_secs"));
    }
    if config.imds.token_sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero("imds.token_sweep_interval_secs"));
    }
    if !(1..=64).contains(&config.imds.hop_limit) {
        errors.push(ValidationError::HopLimit(config.imds.hop_limit));
    }
    if !(1..=MAX_TTL_SECS).contains(&config.imds.max_token_ttl_secs) {
        errors.push(ValidationError::MaxTokenTtl(config.imds.max_token_ttl_secs));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    check_latency(&mut errors, "latency", &config.latency);

    for (path, ov) in &config.overrides {
        if let Some(range) = &ov.latency {
            check_latency(&mut errors, &format!("override '{path}' latency"), range);
        }
        if let Some(status) = ov.status {
            if !(100..=599).contains(&status) {
                errors.push(ValidationError::Status {
                    path: path.clone(),
                    status,
                });
            }
        }
        if let Some(probability) = ov.probability {
            if !(0.0..=1.0).contains(&probability) {
                errors.push(ValidationError::Probability {
                    path: path.clone(),
                    probability,
                });
            }
            if ov.status.is_none() {
                errors.push(ValidationError::ProbabilityWithoutStatus { path: path.clone() });
            }
        }
    }

    match Catalog::from_config(config) {
        Ok(catalog) => {
            for path in config.overrides.keys() {
                if path != TOKEN_PATH && !catalog.contains(path) {
                    errors.push(ValidationError::UnknownOverridePath(path.clone()));
                }
            }
        }
        Err(e) => errors.push(e.into()),
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
    use crate::config::schema::PathOverride;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&MockConfig::default()), Ok(()));
    }

    #[test]
    fn test_unknown_override_path() {
        let mut config = MockConfig::default();
        config.overrides.insert(
            "latest/meta-data/does-not-exist".into(),
            PathOverride {
                status: Some(500),
                ..Default::default()
            },
        );
        // Directories and the token path are valid targets.
        config.overrides.insert("latest/meta-data/iam".into(), PathOverride::default());
        config.overrides.insert(TOKEN_PATH.into(), PathOverride::default());

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::UnknownOverridePath(
                "latest/meta-data/does-not-exist".into()
            )])
        );
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = MockConfig::default();
        config.server.grace_period_secs = 0;
        config.imds.hop_limit = 0;
        config.latency = LatencyRange { min_ms: 10, max_ms: 1 };
        config.overrides.insert(
            "latest/meta-data/ami-id".into(),
            PathOverride {
                status: Some(999),
                probability: Some(1.5),
                ..Default::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.contains(&ValidationError::HopLimit(0)));
        assert!(errors.contains(&ValidationError::Zero("server.grace_period_secs")));
    }

    #[test]
    fn test_probability_requires_status() {
        let mut config = MockConfig::default();
        config.overrides.insert(
            "latest/meta-data/ami-id".into(),
            PathOverride {
                probability: Some(0.5),
                ..Default::default()
            },
        );
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ProbabilityWithoutStatus {
                path: "latest/meta-data/ami-id".into()
            }])
        );
    }
}
