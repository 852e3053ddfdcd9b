//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, matched in declaration order.
    pub routes: Vec<RouteConfig>,

    /// JWT authentication settings shared by every authentication filter.
    pub auth: AuthConfig,

    /// Upstream forwarding settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Gateway-local health/info endpoints.
    pub management: ManagementConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            routes: default_routes(),
            auth: AuthConfig::default(),
            upstream: UpstreamConfig::default(),
            observability: ObservabilityConfig::default(),
            management: ManagementConfig::default(),
        }
    }
}

/// The reference route table: a rate-limited auth service, a public product
/// service and the protected user/order services.
fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig {
            id: "auth-service".to_string(),
            paths: vec!["/api/v1/auth/**".to_string()],
            uri: "http://localhost:8080".to_string(),
            filters: vec![
                FilterConfig::Logging,
                FilterConfig::RateLimit(RateLimitConfig::default()),
            ],
        },
        RouteConfig {
            id: "product-service".to_string(),
            paths: vec!["/api/v1/smartphones/**".to_string()],
            uri: "http://product-service:8080".to_string(),
            filters: vec![FilterConfig::Logging],
        },
        RouteConfig {
            id: "protected-services".to_string(),
            paths: vec![
                "/api/v1/users/**".to_string(),
                "/api/v1/orders/**".to_string(),
            ],
            uri: "http://localhost:8082".to_string(),
            filters: vec![FilterConfig::Authentication, FilterConfig::Logging],
        },
    ]
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Route configuration mapping path patterns to an upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub id: String,

    /// Path patterns; a trailing `/**` matches the prefix and everything below it.
    pub paths: Vec<String>,

    /// Upstream base URI (e.g., "http://localhost:8082").
    pub uri: String,

    /// Filters applied to this route. Execution order is fixed by filter kind,
    /// not by the order listed here.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// A filter declared on a route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Request/response logging. Always applied, listing it is optional.
    Logging,
    /// Token-bucket rate limiting.
    RateLimit(RateLimitConfig),
    /// Bearer JWT authentication.
    Authentication,
}

impl FilterConfig {
    /// Name used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FilterConfig::Logging => "logging",
            FilterConfig::RateLimit(_) => "rate_limit",
            FilterConfig::Authentication => "authentication",
        }
    }
}

/// Rate limiting configuration for one filter instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub replenish_rate: f64,

    /// Bucket capacity.
    pub burst_capacity: u64,

    /// Tokens each request costs.
    pub requested_tokens: u64,

    /// How the bucket key is derived from a request.
    pub key_resolver: KeyResolverConfig,

    /// Drop buckets idle for longer than this many seconds.
    /// Unset keeps every bucket for the process lifetime.
    pub idle_ttl_secs: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            replenish_rate: 10.0,
            burst_capacity: 20,
            requested_tokens: 1,
            key_resolver: KeyResolverConfig::RemoteAddress,
            idle_ttl_secs: None,
        }
    }
}

/// Bucket key derivation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyResolverConfig {
    /// Client IP address, or `"unknown"` when none is observable.
    #[default]
    RemoteAddress,
    /// Value of the named request header, or `"unknown"` when absent.
    Header(String),
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret. Overridden by `GATEWAY_JWT_SECRET`.
    pub jwt_secret: Option<String>,

    /// Path prefixes that bypass authentication (case-sensitive).
    pub exempt_prefixes: Vec<String>,

    /// Allowed clock skew when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            exempt_prefixes: vec![
                "/api/v1/auth/".to_string(),
                "/actuator/health".to_string(),
                "/actuator/info".to_string(),
            ],
            leeway_secs: 0,
        }
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Total time allowed for the upstream to return a response head, in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Gateway-local management endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Serve `/actuator/health` and `/actuator/info` from the gateway itself.
    pub enabled: bool,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
