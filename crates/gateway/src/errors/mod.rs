//! Error types and failure classification for the gateway.
//!
//! This module provides:
//! - [`GatewayError`]: The error enum returned by every gateway operation
//! - [`FailureClass`]: Classification consumed by the controller layer
//! - [`SourceFailure`]: One failed strategy inside a fallback chain

mod class;

pub use class::FailureClass;

use std::fmt;

use thiserror::Error;

/// Errors that can occur while fetching data from an upstream.
///
/// The enum is `Clone` so a single settled upstream call can be handed to every
/// caller that joined it. Transport errors are therefore converted into typed
/// variants (see [`GatewayError::transport`]) instead of being wrapped.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The upstream signaled quota exhaustion (HTTP 429 or a quota payload).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The upstream answered with a non-2xx status or could not be reached.
    #[error("Upstream unavailable: {provider} - {message}")]
    UpstreamUnavailable {
        /// The provider that failed
        provider: String,
        /// Status line or transport error text
        message: String,
    },

    /// The request exceeded the provider's per-call deadline.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The token endpoint or the upstream rejected our credentials.
    #[error("Authentication failed: {provider} - {message}")]
    AuthFailure {
        /// The provider that rejected the credentials
        provider: String,
        /// Error description returned by the provider
        message: String,
    },

    /// The upstream payload was well-formed but empty.
    #[error("Not found: {provider} - {resource}")]
    NotFound {
        /// The provider that was asked
        provider: String,
        /// What was requested (symbol, series id, query, ...)
        resource: String,
    },

    /// The upstream payload could not be understood.
    #[error("Invalid payload: {provider} - {message}")]
    InvalidPayload {
        /// The provider that sent the payload
        provider: String,
        /// Parse error or unexpected payload description
        message: String,
    },

    /// Every strategy in a fallback chain failed.
    #[error("All sources failed for {dataset}: {}", join_failures(.attempts))]
    AllSourcesExhausted {
        /// Logical dataset the chain was serving
        dataset: String,
        /// One entry per attempted source, in priority order
        attempts: Vec<SourceFailure>,
    },

    /// Settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A shared upstream call ended without producing a result (it panicked).
    #[error("Call interrupted: {0}")]
    Interrupted(String),
}

/// A single failed strategy inside a fallback chain.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    /// Name of the strategy, e.g. `"FiscalDataJson"`
    pub source: String,
    /// The error that strategy produced
    pub error: GatewayError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

fn join_failures(attempts: &[SourceFailure]) -> String {
    if attempts.is_empty() {
        return "no sources configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

impl GatewayError {
    /// Convert a `reqwest` transport error into a typed gateway error.
    pub fn transport(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else {
            Self::UpstreamUnavailable {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Returns the failure classification for this error.
    ///
    /// A fallback chain failure reports the class shared by all of its
    /// attempts; mixed (or empty) attempts are reported as `Connectivity`.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketdesk_gateway::errors::{FailureClass, GatewayError};
    ///
    /// let error = GatewayError::RateLimited { provider: "ALPHA_VANTAGE".to_string() };
    /// assert_eq!(error.class(), FailureClass::RateLimited);
    ///
    /// let error = GatewayError::Timeout { provider: "FRED".to_string() };
    /// assert_eq!(error.class(), FailureClass::Connectivity);
    /// ```
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RateLimited { .. } => FailureClass::RateLimited,
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. } => FailureClass::Connectivity,
            Self::AuthFailure { .. } => FailureClass::Auth,
            Self::NotFound { .. } => FailureClass::NotFound,
            Self::InvalidPayload { .. } | Self::Configuration(_) | Self::Interrupted(_) => {
                FailureClass::Internal
            }
            Self::AllSourcesExhausted { attempts, .. } => {
                let mut classes = attempts.iter().map(|a| a.error.class());
                match classes.next() {
                    Some(first) if classes.all(|c| c == first) => first,
                    _ => FailureClass::Connectivity,
                }
            }
        }
    }

    /// Whether the upstream reported quota exhaustion.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
