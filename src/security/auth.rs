//! Bearer JWT authentication filter.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::filter::{Filter, FilterKind, Next};
use crate::http::request::Exchange;

pub const MISSING_HEADER_MESSAGE: &str = "Missing or invalid Authorization header";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid JWT token";
pub const VALIDATION_FAILED_MESSAGE: &str = "JWT validation failed";

const BEARER_PREFIX: &str = "Bearer ";

/// Result of validating a request's credentials.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Continue the chain. `None` for exempt paths.
    Pass(Option<AuthContext>),
    Reject {
        status: StatusCode,
        message: &'static str,
    },
}

/// Decoded credential, attached to the request extensions.
#[derive(Clone)]
pub struct AuthContext {
    pub token: String,
    pub claims: Map<String, Value>,
    pub valid: bool,
}

impl AuthContext {
    /// The `sub` claim, used for observability only.
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"<redacted>")
            .field("subject", &self.subject())
            .field("valid", &self.valid)
            .finish()
    }
}

/// Validates HMAC-signed bearer tokens.
pub struct JwtAuthFilter {
    key: DecodingKey,
    validation: Validation,
    exempt_prefixes: Vec<String>,
}

impl JwtAuthFilter {
    /// Build the filter from the signing secret and auth settings.
    /// The secret's UTF-8 bytes are the HMAC key.
    pub fn new(secret: &str, config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // exp/nbf are checked when present, never required
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = config.leeway_secs;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            exempt_prefixes: config.exempt_prefixes.clone(),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Decide whether a request may continue.
    pub fn authenticate(&self, path: &str, headers: &HeaderMap) -> AuthOutcome {
        if self.is_exempt(path) {
            return AuthOutcome::Pass(None);
        }

        let token = match headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        {
            Some(token) => token,
            None => {
                tracing::debug!(path = %path, "Missing or malformed Authorization header");
                return AuthOutcome::Reject {
                    status: StatusCode::UNAUTHORIZED,
                    message: MISSING_HEADER_MESSAGE,
                };
            }
        };

        match decode::<Map<String, Value>>(token, &self.key, &self.validation) {
            Ok(data) => {
                let ctx = AuthContext {
                    token: token.to_string(),
                    claims: data.claims,
                    valid: true,
                };
                tracing::debug!(subject = ?ctx.subject(), "JWT validated");
                AuthOutcome::Pass(Some(ctx))
            }
            Err(err) => {
                let message = match err.kind() {
                    ErrorKind::InvalidKeyFormat
                    | ErrorKind::InvalidRsaKey(_)
                    | ErrorKind::InvalidEcdsaKey
                    | ErrorKind::RsaFailedSigning
                    | ErrorKind::Crypto(_) => {
                        tracing::error!(path = %path, error = %err, "JWT validation error");
                        VALIDATION_FAILED_MESSAGE
                    }
                    _ => {
                        tracing::warn!(path = %path, error = %err, "JWT validation failed");
                        INVALID_TOKEN_MESSAGE
                    }
                };
                AuthOutcome::Reject {
                    status: StatusCode::UNAUTHORIZED,
                    message,
                }
            }
        }
    }
}

impl fmt::Debug for JwtAuthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthFilter")
            .field("algorithms", &self.validation.algorithms)
            .field("exempt_prefixes", &self.exempt_prefixes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Filter for JwtAuthFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Authentication
    }

    async fn apply(&self, mut exchange: Exchange, next: Next<'_>) -> Result<Response, GatewayError> {
        match self.authenticate(exchange.path(), exchange.request.headers()) {
            AuthOutcome::Pass(ctx) => {
                if let Some(ctx) = ctx {
                    exchange.request.extensions_mut().insert(ctx);
                }
                next.run(exchange).await
            }
            AuthOutcome::Reject { status, message } => {
                Err(GatewayError::AuthenticationRejected {
                    status,
                    message: message.to_string(),
                })
            }
        }
    }
}
