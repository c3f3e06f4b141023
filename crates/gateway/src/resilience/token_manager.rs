//! OAuth2 client-credentials token management.
//!
//! A [`TokenManager`] caches one bearer token per provider and refreshes it
//! ahead of its true expiry. Concurrent callers that find the token missing or
//! stale share a single refresh call. A failed refresh is returned to every
//! waiter and is not retried.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;

use super::SingleFlight;
use crate::errors::GatewayError;

/// Default margin subtracted from `expires_in` to force early renewal.
pub const DEFAULT_TOKEN_SKEW: Duration = Duration::from_secs(300);

/// Upper bound on how long a single grant is reused, whatever `expires_in` says.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Source of fresh tokens for a single provider.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Provider identifier, used for logging and single-flight keying.
    fn provider(&self) -> &'static str;

    /// Request a new token from the provider.
    async fn fetch_token(&self) -> Result<TokenGrant, GatewayError>;
}

/// Client-credentials grant against a token endpoint using HTTP Basic auth.
pub struct ClientCredentials {
    provider: &'static str,
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientCredentials {
    pub fn new(
        provider: &'static str,
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TokenFetcher for ClientCredentials {
    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn fetch_token(&self) -> Result<TokenGrant, GatewayError> {
        debug!("{}: requesting token from {}", self.provider, self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::transport(self.provider, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::transport(self.provider, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|err| err.error_description.or(err.error))
                .unwrap_or_else(|| format!("HTTP {}", status));
            warn!("{}: token request rejected: {}", self.provider, message);
            return Err(GatewayError::AuthFailure {
                provider: self.provider.to_string(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::InvalidPayload {
            provider: self.provider.to_string(),
            message: format!("Failed to parse token response: {}", e),
        })
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    /// Already reduced by the skew
    expires_at: Instant,
}

/// Caches a bearer token and refreshes it before it expires.
pub struct TokenManager {
    fetcher: Arc<dyn TokenFetcher>,
    skew: Duration,
    current: Arc<Mutex<Option<AccessToken>>>,
    refresh: SingleFlight<AccessToken>,
}

impl TokenManager {
    pub fn new(fetcher: Arc<dyn TokenFetcher>, skew: Duration) -> Self {
        Self {
            fetcher,
            skew,
            current: Arc::new(Mutex::new(None)),
            refresh: SingleFlight::new(),
        }
    }

    fn lock_current(current: &Mutex<Option<AccessToken>>) -> MutexGuard<'_, Option<AccessToken>> {
        current.lock().unwrap_or_else(|poisoned| {
            warn!("Token mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Return a valid bearer token, refreshing it if needed.
    pub async fn get_token(&self) -> Result<String, GatewayError> {
        if let Some(token) = Self::valid_token(&self.current) {
            return Ok(token.value);
        }
        self.renew().await
    }

    /// Coalesced refresh. A token stored by a refresh that settled after the
    /// caller's own validity check is returned without another grant.
    async fn renew(&self) -> Result<String, GatewayError> {
        let provider = self.fetcher.provider();
        let fetcher = Arc::clone(&self.fetcher);
        let current = Arc::clone(&self.current);
        let skew = self.skew;

        let token = self
            .refresh
            .run(provider, move || async move {
                if let Some(token) = Self::valid_token(&current) {
                    debug!("{}: token already refreshed", fetcher.provider());
                    return Ok(token);
                }

                let grant = fetcher.fetch_token().await?;
                let lifetime = Duration::from_secs(grant.expires_in)
                    .min(MAX_TOKEN_LIFETIME)
                    .saturating_sub(skew);
                let now = Instant::now();
                let token = AccessToken {
                    value: grant.access_token,
                    expires_at: now.checked_add(lifetime).unwrap_or(now),
                };
                *Self::lock_current(&current) = Some(token.clone());
                info!(
                    "{}: access token refreshed, reused for {:?}",
                    fetcher.provider(),
                    lifetime
                );
                Ok(token)
            })
            .await?;

        Ok(token.value)
    }

    /// Drop the cached token if it is `rejected`, so the next call refreshes it.
    ///
    /// Used when the upstream rejects a token before its computed expiry. A
    /// rejection of an older token leaves a newer cached one in place.
    pub fn invalidate(&self, rejected: &str) {
        let mut current = Self::lock_current(&self.current);
        if current.as_ref().is_some_and(|token| token.value == rejected) {
            *current = None;
            debug!("{}: cached token invalidated", self.fetcher.provider());
        }
    }

    fn valid_token(current: &Mutex<Option<AccessToken>>) -> Option<AccessToken> {
        let now = Instant::now();
        Self::lock_current(current)
            .as_ref()
            .filter(|token| now < token.expires_at)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;

    struct CountingFetcher {
        calls: AtomicUsize,
        expires_in: u64,
        delay: Duration,
        reject: bool,
    }

    impl CountingFetcher {
        fn new(expires_in: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expires_in,
                delay: Duration::ZERO,
                reject: false,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenFetcher for CountingFetcher {
        fn provider(&self) -> &'static str {
            "TEST_OAUTH"
        }

        async fn fetch_token(&self) -> Result<TokenGrant, GatewayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.reject {
                return Err(GatewayError::AuthFailure {
                    provider: "TEST_OAUTH".to_string(),
                    message: "invalid_client".to_string(),
                });
            }
            Ok(TokenGrant {
                access_token: format!("token-{}", n),
                expires_in: self.expires_in,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_reused_inside_skew_window() {
        let fetcher = Arc::new(CountingFetcher::new(600));
        let manager = TokenManager::new(fetcher.clone(), Duration::from_secs(300));

        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        for _ in 0..59 {
            tokio::time::advance(Duration::from_secs(5)).await;
            assert_eq!(manager.get_token().await.unwrap(), "token-1");
        }
        assert_eq!(fetcher.calls(), 1);

        // 300s after issue the token is considered expired
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refresh_is_single_flight() {
        let fetcher = Arc::new(CountingFetcher {
            delay: Duration::from_millis(200),
            ..CountingFetcher::new(3600)
        });
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        let tokens = join_all((0..10).map(|_| manager.get_token())).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(tokens.iter().all(|t| matches!(t.as_deref(), Ok("token-1"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_refresh_fails_every_waiter() {
        let fetcher = Arc::new(CountingFetcher {
            delay: Duration::from_millis(50),
            reject: true,
            ..CountingFetcher::new(3600)
        });
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        let results = join_all((0..4).map(|_| manager.get_token())).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(GatewayError::AuthFailure { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refresh() {
        let fetcher = Arc::new(CountingFetcher::new(3600));
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        manager.invalidate("token-1");
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_of_older_token_keeps_newer_one() {
        let fetcher = Arc::new(CountingFetcher::new(3600));
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        let old = manager.get_token().await.unwrap();
        manager.invalidate(&old);
        assert_eq!(manager.get_token().await.unwrap(), "token-2");

        // A late 401 for a request that carried token-1
        manager.invalidate(&old);
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_returns_token_stored_meanwhile() {
        let fetcher = Arc::new(CountingFetcher::new(3600));
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        // A caller that saw no valid token just before the refresh above settled
        assert_eq!(manager.renew().await.unwrap(), "token-1");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_expires_in_is_capped() {
        let fetcher = Arc::new(CountingFetcher::new(u64::MAX));
        let manager = TokenManager::new(fetcher.clone(), DEFAULT_TOKEN_SKEW);

        assert_eq!(manager.get_token().await.unwrap(), "token-1");
        tokio::time::advance(MAX_TOKEN_LIFETIME - DEFAULT_TOKEN_SKEW - Duration::from_secs(1)).await;
        assert_eq!(manager.get_token().await.unwrap(), "token-1");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(manager.get_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifetime_shorter_than_skew_is_never_reused() {
        let fetcher = Arc::new(CountingFetcher::new(120));
        let manager = TokenManager::new(fetcher.clone(), Duration::from_secs(300));

        manager.get_token().await.unwrap();
        manager.get_token().await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }
}
