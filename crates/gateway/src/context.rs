//! Shared state handed to every provider client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::GatewayConfig;
use crate::errors::GatewayError;
use crate::models::{BondPrice, BondRates, MacroObservation, NewsArticle, Quote, Sourced};
use crate::provider::alpha_vantage;
use crate::provider::bond_pricing;
use crate::resilience::{ClientCredentials, KeyPool, ResponseCache, TokenManager};

const USER_AGENT: &str = concat!("marketdesk-gateway/", env!("CARGO_PKG_VERSION"));

/// One response cache per dataset.
pub struct GatewayCaches {
    pub quotes: Arc<ResponseCache<Quote>>,
    pub macro_latest: Arc<ResponseCache<MacroObservation>>,
    pub macro_history: Arc<ResponseCache<Vec<MacroObservation>>>,
    pub news: Arc<ResponseCache<Vec<NewsArticle>>>,
    pub bond_rates: Arc<ResponseCache<Sourced<BondRates>>>,
    pub bond_prices: Arc<ResponseCache<BondPrice>>,
}

impl GatewayCaches {
    fn new(config: &GatewayConfig) -> Self {
        Self {
            quotes: Arc::new(ResponseCache::new("quote", config.alpha_vantage.ttl)),
            macro_latest: Arc::new(ResponseCache::new("macro", config.fred.ttl)),
            macro_history: Arc::new(ResponseCache::new("macro history", config.fred.ttl)),
            news: Arc::new(ResponseCache::new("news", config.news.ttl)),
            bond_rates: Arc::new(ResponseCache::new("bond rates", config.fiscal_data.ttl)),
            bond_prices: Arc::new(ResponseCache::new("bond price", config.bond_pricing.ttl)),
        }
    }

    /// Drop expired entries from every cache, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.quotes.entries().purge_expired()
            + self.macro_latest.entries().purge_expired()
            + self.macro_history.entries().purge_expired()
            + self.news.entries().purge_expired()
            + self.bond_rates.entries().purge_expired()
            + self.bond_prices.entries().purge_expired()
    }
}

/// Configuration, HTTP client, caches, key pool and token manager.
///
/// A context is built once per process. Tests build a fresh one per case so
/// nothing leaks between them.
pub struct GatewayContext {
    pub config: GatewayConfig,
    pub http: Client,
    pub quote_keys: Arc<KeyPool>,
    pub bond_pricing_tokens: Option<Arc<TokenManager>>,
    pub caches: GatewayCaches,
}

impl GatewayContext {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(config, http)
    }

    /// Build a context around an existing HTTP client.
    pub fn with_client(config: GatewayConfig, http: Client) -> Result<Self, GatewayError> {
        let quote_keys = Arc::new(KeyPool::new(
            alpha_vantage::PROVIDER_ID,
            config.alpha_vantage_keys.clone(),
            config.key_cooldown,
        )?);

        let bond_pricing_tokens = config.bond_pricing_oauth.as_ref().map(|oauth| {
            let fetcher = ClientCredentials::new(
                bond_pricing::PROVIDER_ID,
                http.clone(),
                oauth.token_url.clone(),
                oauth.client_id.clone(),
                oauth.client_secret.clone(),
                config.bond_pricing.timeout,
            );
            Arc::new(TokenManager::new(Arc::new(fetcher), config.token_skew))
        });

        let caches = GatewayCaches::new(&config);

        Ok(Self {
            config,
            http,
            quote_keys,
            bond_pricing_tokens,
            caches,
        })
    }
}
