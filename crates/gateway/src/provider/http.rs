//! HTTP plumbing shared by the provider clients.

use std::str::FromStr;

use reqwest::{RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::errors::GatewayError;

/// Status and body of a completed upstream call.
#[derive(Debug)]
pub(crate) struct UpstreamResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Send `request` and read the whole body.
///
/// Transport failures become `Timeout` or `UpstreamUnavailable`; the status
/// is left for the caller to classify.
pub(crate) async fn send(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<UpstreamResponse, GatewayError> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::transport(provider, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::transport(provider, e))?;

    Ok(UpstreamResponse { status, body })
}

impl UpstreamResponse {
    /// Map a non-2xx status to the matching gateway error.
    pub fn error_for_status(&self, provider: &str) -> Result<(), GatewayError> {
        let status = self.status;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited {
                provider: provider.to_string(),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::AuthFailure {
                provider: provider.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable {
                provider: provider.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        Ok(())
    }

    pub fn json<T: DeserializeOwned>(&self, provider: &str) -> Result<T, GatewayError> {
        serde_json::from_str(&self.body).map_err(|e| GatewayError::InvalidPayload {
            provider: provider.to_string(),
            message: format!("Failed to parse response: {}", e),
        })
    }
}

/// Parse an upstream numeric string, tolerating percent signs and the
/// placeholders providers use for "no value".
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() || matches!(trimmed, "." | "-" | "None" | "null") {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

/// Parse a JSON scalar (string or number) as a decimal.
pub(crate) fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => parse_decimal(s),
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}
