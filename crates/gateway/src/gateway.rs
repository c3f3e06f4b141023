//! Facade exposing one async call per logical dataset.

use chrono::NaiveDate;
use log::info;

use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{
    BondPrice, BondRates, Fetched, MacroObservation, MacroRates, NewsArticle, Quote, Sourced,
};
use crate::provider::{
    AlphaVantageClient, BondPricingClient, FiscalDataClient, FredClient, NewsApiClient,
};
use crate::resilience::settle_all;

/// Entry point used by controllers.
///
/// Errors from provider clients are returned unchanged; the gateway never
/// retries.
pub struct Gateway {
    context: GatewayContext,
    quotes: AlphaVantageClient,
    fred: FredClient,
    news: NewsApiClient,
    fiscal: FiscalDataClient,
    bond_pricing: BondPricingClient,
}

impl Gateway {
    pub fn new(context: GatewayContext) -> Self {
        info!(
            "Gateway ready: {} quote key(s), FRED {}, NewsAPI {}, bond pricing {}",
            context.quote_keys.len(),
            enabled(context.config.fred_api_key.is_some()),
            enabled(context.config.news_api_key.is_some()),
            enabled(context.bond_pricing_tokens.is_some()),
        );

        Self {
            quotes: AlphaVantageClient::new(&context),
            fred: FredClient::new(&context),
            news: NewsApiClient::new(&context),
            fiscal: FiscalDataClient::new(&context),
            bond_pricing: BondPricingClient::new(&context),
            context,
        }
    }

    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(GatewayContext::new(config)?))
    }

    pub fn context(&self) -> &GatewayContext {
        &self.context
    }

    pub async fn quote(&self, symbol: &str) -> Result<Fetched<Quote>, GatewayError> {
        self.quotes.quote(symbol).await
    }

    /// Latest value of one macro series.
    pub async fn macro_series(
        &self,
        series_id: &str,
    ) -> Result<Fetched<MacroObservation>, GatewayError> {
        self.fred.latest(series_id).await
    }

    pub async fn macro_history(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Fetched<Vec<MacroObservation>>, GatewayError> {
        self.fred.history(series_id, start, end).await
    }

    /// Latest value of every configured macro series, fetched concurrently.
    ///
    /// Never fails: a series whose fetch failed is reported as `None`. The
    /// bundle counts as cached only when every series that produced a value
    /// was served from cache.
    pub async fn macro_rates(&self) -> Fetched<MacroRates> {
        let branches: Vec<_> = self
            .context
            .config
            .macro_series
            .iter()
            .map(|id| (id.clone(), self.fred.latest(id)))
            .collect();

        let settled = settle_all(branches).await;

        let present: Vec<bool> = settled
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().map(|f| f.from_cache))
            .collect();
        let from_cache = !present.is_empty() && present.iter().all(|cached| *cached);

        let rates = settled
            .into_iter()
            .map(|(id, outcome)| (id, outcome.map(|f| f.data)))
            .collect();

        Fetched {
            data: MacroRates { rates },
            from_cache,
        }
    }

    pub async fn news(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Fetched<Vec<NewsArticle>>, GatewayError> {
        self.news.search(query, limit).await
    }

    /// Average Treasury rates from the first source in the fallback chain that
    /// answers.
    pub async fn bond_rates(&self) -> Result<Fetched<Sourced<BondRates>>, GatewayError> {
        self.fiscal.average_rates().await
    }

    pub async fn bond_price(&self, isin: &str) -> Result<Fetched<BondPrice>, GatewayError> {
        self.bond_pricing.price(isin).await
    }

    /// Drop expired cache entries across every dataset.
    pub fn purge_expired(&self) -> usize {
        self.context.caches.purge_expired()
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
