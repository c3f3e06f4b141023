//! Gateway configuration loaded from the environment.
//!
//! Every provider has a base URL, a per-call timeout and a cache TTL. Base
//! URLs can be overridden, which is how tests point clients at a local mock
//! upstream.

use std::time::Duration;

use crate::errors::GatewayError;
use crate::resilience::DEFAULT_TOKEN_SKEW;

const DEFAULT_KEY_COOLDOWN: Duration = Duration::from_secs(60);
const DEFAULT_MACRO_SERIES: [&str; 4] = ["DFF", "DGS2", "DGS10", "CPIAUCSL"];

/// Connection and caching settings for one upstream.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub ttl: Duration,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64, ttl_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client-credentials settings for an OAuth2-protected upstream.
#[derive(Clone)]
pub struct OAuthSettings {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// Complete gateway configuration.
///
/// Only the quote key pool is mandatory. A dataset whose credentials are
/// absent stays disabled and its gateway call returns a configuration error.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub alpha_vantage: ProviderSettings,
    pub alpha_vantage_keys: Vec<String>,
    pub fred: ProviderSettings,
    pub fred_api_key: Option<String>,
    pub news: ProviderSettings,
    pub news_api_key: Option<String>,
    pub fiscal_data: ProviderSettings,
    pub fiscal_csv: ProviderSettings,
    pub bond_pricing: ProviderSettings,
    pub bond_pricing_oauth: Option<OAuthSettings>,
    /// Series fetched by the consolidated macro-rate bundle
    pub macro_series: Vec<String>,
    pub token_skew: Duration,
    pub key_cooldown: Duration,
}

impl GatewayConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let alpha_vantage_keys: Vec<String> = var("MD_ALPHA_VANTAGE_KEYS")
            .ok_or_else(|| GatewayError::Configuration("MD_ALPHA_VANTAGE_KEYS is not set".into()))?
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let bond_pricing_base = url("MD_BOND_PRICING_BASE_URL", "");
        let bond_pricing_oauth = match (
            var("MD_BOND_PRICING_TOKEN_URL"),
            var("MD_BOND_PRICING_CLIENT_ID"),
            var("MD_BOND_PRICING_CLIENT_SECRET"),
        ) {
            (Some(token_url), Some(client_id), Some(client_secret))
                if !bond_pricing_base.is_empty() =>
            {
                Some(OAuthSettings {
                    token_url,
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        };

        let macro_series = var("MD_MACRO_SERIES")
            .map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_uppercase())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_MACRO_SERIES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            alpha_vantage: ProviderSettings::new(
                url("MD_ALPHA_VANTAGE_BASE_URL", "https://www.alphavantage.co"),
                10,
                300,
            ),
            alpha_vantage_keys,
            fred: ProviderSettings::new(
                url("MD_FRED_BASE_URL", "https://api.stlouisfed.org"),
                10,
                1800,
            ),
            fred_api_key: var("MD_FRED_API_KEY"),
            news: ProviderSettings::new(url("MD_NEWS_BASE_URL", "https://newsapi.org"), 8, 600),
            news_api_key: var("MD_NEWS_API_KEY"),
            fiscal_data: ProviderSettings::new(
                url("MD_FISCAL_DATA_BASE_URL", "https://api.fiscaldata.treasury.gov"),
                15,
                1800,
            ),
            fiscal_csv: ProviderSettings::new(
                url("MD_FISCAL_CSV_URL", "https://api.fiscaldata.treasury.gov"),
                15,
                1800,
            ),
            bond_pricing: ProviderSettings::new(bond_pricing_base, 12, 300),
            bond_pricing_oauth,
            macro_series,
            token_skew: parse_secs(var("MD_TOKEN_SKEW_SECS"), DEFAULT_TOKEN_SKEW)?,
            key_cooldown: parse_secs(var("MD_KEY_COOLDOWN_SECS"), DEFAULT_KEY_COOLDOWN)?,
        })
    }
}

fn parse_secs(value: Option<String>, default: Duration) -> Result<Duration, GatewayError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| GatewayError::Configuration(format!("Invalid seconds value: {}", raw))),
    }
}
