//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. Every problem is
//! collected so an operator sees the full list in one run.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{FilterConfig, GatewayConfig, KeyResolverConfig, RateLimitConfig};

/// Minimum HMAC-SHA256 key length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut needs_secret = false;

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);

        if route.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.id", field), "must not be empty"));
        } else if !seen_ids.insert(route.id.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.id", field),
                format!("duplicate route id '{}'", route.id),
            ));
        }

        if route.paths.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.paths", field),
                "at least one path pattern is required",
            ));
        }
        for pattern in &route.paths {
            if let Err(message) = check_pattern(pattern) {
                errors.push(ValidationError::new(format!("{}.paths", field), message));
            }
        }

        match Url::parse(&route.uri) {
            Ok(url) if url.query().is_some() || url.fragment().is_some() => {
                errors.push(ValidationError::new(
                    format!("{}.uri", field),
                    format!("'{}' must not carry a query or fragment", route.uri),
                ))
            }
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(
                format!("{}.uri", field),
                format!("'{}' must be an absolute http(s) URI", route.uri),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("{}.uri", field),
                format!("'{}' is not a valid URI: {}", route.uri, e),
            )),
        }

        let mut kinds = HashSet::new();
        for filter in &route.filters {
            if !kinds.insert(filter.kind()) {
                errors.push(ValidationError::new(
                    format!("{}.filters", field),
                    format!("filter '{}' declared more than once", filter.kind()),
                ));
            }
            match filter {
                FilterConfig::RateLimit(rl) => {
                    check_rate_limit(rl, &format!("{}.filters.rate_limit", field), &mut errors)
                }
                FilterConfig::Authentication => needs_secret = true,
                FilterConfig::Logging => {}
            }
        }
    }

    if needs_secret {
        match config.auth.jwt_secret.as_deref() {
            None | Some("") => errors.push(ValidationError::new(
                "auth.jwt_secret",
                "required when a route uses the authentication filter (set GATEWAY_JWT_SECRET)",
            )),
            Some(secret) if secret.len() < MIN_SECRET_LEN => errors.push(ValidationError::new(
                "auth.jwt_secret",
                format!("must be at least {} bytes for HMAC-SHA256", MIN_SECRET_LEN),
            )),
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_pattern(pattern: &str) -> Result<(), String> {
    if !pattern.starts_with('/') {
        return Err(format!("pattern '{}' must start with '/'", pattern));
    }
    let literal = pattern.strip_suffix("**").unwrap_or(pattern);
    if literal.contains('*') {
        return Err(format!(
            "pattern '{}' may only use '**' as a trailing wildcard",
            pattern
        ));
    }
    Ok(())
}

fn check_rate_limit(rl: &RateLimitConfig, field: &str, errors: &mut Vec<ValidationError>) {
    if !(rl.replenish_rate.is_finite() && rl.replenish_rate > 0.0) {
        errors.push(ValidationError::new(
            format!("{}.replenish_rate", field),
            "must be a positive number",
        ));
    }
    if rl.burst_capacity == 0 {
        errors.push(ValidationError::new(
            format!("{}.burst_capacity", field),
            "must be at least 1",
        ));
    }
    if rl.requested_tokens == 0 || rl.requested_tokens > rl.burst_capacity {
        errors.push(ValidationError::new(
            format!("{}.requested_tokens", field),
            format!("must be between 1 and burst_capacity ({})", rl.burst_capacity),
        ));
    }
    if let KeyResolverConfig::Header(name) = &rl.key_resolver {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.key_resolver", field),
                format!("'{}' is not a valid header name", name),
            ));
        }
    }
    if let Some(ttl) = rl.idle_ttl_secs {
        // An idle bucket is only guaranteed full again after burst / rate seconds.
        let refill_secs = rl.burst_capacity as f64 / rl.replenish_rate;
        if rl.replenish_rate > 0.0 && (ttl as f64) < refill_secs {
            errors.push(ValidationError::new(
                format!("{}.idle_ttl_secs", field),
                format!("must be at least {:.0} (burst_capacity / replenish_rate)", refill_secs.ceil()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn secret() -> String {
        "0123456789abcdef0123456789abcdef".to_string()
    }

    #[test]
    fn test_default_config_needs_secret() {
        let config = GatewayConfig::default();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "auth.jwt_secret");

        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = Some(secret());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = Some("too-short".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("32 bytes"));
    }

    #[test]
    fn test_collects_all_route_errors() {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = Some(secret());
        config.routes = vec![
            RouteConfig {
                id: "a".into(),
                paths: vec!["api/**".into(), "/x/*/y".into()],
                uri: "not a uri".into(),
                filters: vec![FilterConfig::Logging, FilterConfig::Logging],
            },
            RouteConfig {
                id: "a".into(),
                paths: vec![],
                uri: "ftp://files.example.com".into(),
                filters: vec![FilterConfig::RateLimit(RateLimitConfig {
                    replenish_rate: 0.0,
                    burst_capacity: 0,
                    requested_tokens: 1,
                    key_resolver: KeyResolverConfig::RemoteAddress,
                    idle_ttl_secs: None,
                })],
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"routes[0].paths"));
        assert!(fields.contains(&"routes[0].uri"));
        assert!(fields.contains(&"routes[0].filters"));
        assert!(fields.contains(&"routes[1].id"));
        assert!(fields.contains(&"routes[1].paths"));
        assert!(fields.contains(&"routes[1].uri"));
        assert!(fields.contains(&"routes[1].filters.rate_limit.replenish_rate"));
        assert!(fields.contains(&"routes[1].filters.rate_limit.burst_capacity"));
        assert!(fields.contains(&"routes[1].filters.rate_limit.requested_tokens"));
    }

    #[test]
    fn test_upstream_uri_with_query_or_fragment_rejected() {
        for uri in ["http://svc:8082/base?tenant=a", "http://svc:8082/#top"] {
            let mut config = GatewayConfig::default();
            config.auth.jwt_secret = Some(secret());
            config.routes[0].uri = uri.into();

            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1, "{}", uri);
            assert_eq!(errors[0].field, "routes[0].uri");
            assert!(errors[0].message.contains("query or fragment"));
        }

        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = Some(secret());
        config.routes[0].uri = "http://svc:8082/base".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_requested_tokens_bounded_by_burst() {
        let mut errors = Vec::new();
        for requested in [0, 21] {
            let rl = RateLimitConfig {
                requested_tokens: requested,
                ..RateLimitConfig::default()
            };
            check_rate_limit(&rl, "rl", &mut errors);
        }
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "rl.requested_tokens"));

        errors.clear();
        let rl = RateLimitConfig {
            requested_tokens: 20,
            ..RateLimitConfig::default()
        };
        check_rate_limit(&rl, "rl", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_idle_ttl_must_cover_refill_time() {
        let mut rl = RateLimitConfig::default();
        rl.idle_ttl_secs = Some(1);
        let mut errors = Vec::new();
        check_rate_limit(&rl, "rl", &mut errors);
        assert_eq!(errors.len(), 1);

        rl.idle_ttl_secs = Some(2);
        errors.clear();
        check_rate_limit(&rl, "rl", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_header_key_resolver_name_checked() {
        let mut rl = RateLimitConfig::default();
        rl.key_resolver = KeyResolverConfig::Header("bad header".into());
        let mut errors = Vec::new();
        check_rate_limit(&rl, "rl", &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "rl.key_resolver");
    }
}
