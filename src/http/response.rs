//! Error translation into client responses.
//!
//! # Responsibilities
//! - Map every `GatewayError` to a status code and JSON envelope
//! - Attach `X-RateLimit-*` headers once a rate limiter has run, including
//!   to 429 responses
//! - Refuse to write a second response once one was committed
//!
//! # Design Decisions
//! - Internal details never reach the client; they are logged instead
//! - `requestId` only appears when the client supplied one
//! - Envelope serialization failure degrades to a bare status

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::error::GatewayError;
use crate::http::request::RequestContext;
use crate::security::rate_limit::apply_headers;

/// JSON body of every gateway-generated error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub timestamp: NaiveDateTime,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: String, path: &str, request_id: Option<&str>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message,
            path: path.to_string(),
            request_id: request_id.map(str::to_string),
        }
    }
}

type Encoder = fn(&ErrorEnvelope) -> Result<Vec<u8>, serde_json::Error>;

/// Converts errors into error responses.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    encode: Encoder,
}

fn encode_json(envelope: &ErrorEnvelope) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(envelope)
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self { encode: encode_json }
    }
}

impl ErrorTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_encoder(encode: Encoder) -> Self {
        Self { encode }
    }

    /// Classify an error and build its envelope.
    pub fn translate(
        &self,
        err: &GatewayError,
        path: &str,
        request_id: Option<&str>,
    ) -> (StatusCode, ErrorEnvelope) {
        let (status, message) = err.classify();
        (status, ErrorEnvelope::new(status, message, path, request_id))
    }

    /// Render the error response, or give the error back when a response
    /// head has already gone out.
    pub fn handle(
        &self,
        err: GatewayError,
        path: &str,
        ctx: &RequestContext,
    ) -> Result<Response, GatewayError> {
        if ctx.commit().is_committed() {
            tracing::warn!(
                request_id = %ctx.request_id(),
                error = %err,
                "Response already committed; propagating error"
            );
            return Err(err);
        }

        let (status, envelope) = self.translate(&err, path, ctx.client_request_id());
        if status.is_server_error() {
            tracing::error!(request_id = %ctx.request_id(), path = %path, error = %err, "Gateway error");
        } else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                path = %path,
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        let mut response = self.render(status, &envelope);
        let limits = match &err {
            GatewayError::RateLimitExceeded { limits, .. } => Some(*limits),
            _ => ctx.rate_limit(),
        };
        if let Some(limits) = limits {
            apply_headers(response.headers_mut(), &limits);
        }
        Ok(response)
    }

    fn render(&self, status: StatusCode, envelope: &ErrorEnvelope) -> Response {
        let mut response = match (self.encode)(envelope) {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error envelope");
                Response::new(Body::empty())
            }
        };
        *response.status_mut() = status;
        response
    }
}
