//! U.S. Treasury Fiscal Data client for average interest rates.
//!
//! Rates are served by a two-source fallback chain: the JSON API first, then
//! the CSV export of the same dataset from a mirror host.

mod csv_mirror;

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use log::debug;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::ProviderSettings;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{BondRate, BondRates, Fetched, Sourced};
use crate::provider::http::{parse_decimal, send};
use crate::resilience::{CacheKey, FallbackChain, ResponseCache};

pub const JSON_SOURCE: &str = "FiscalDataJson";
pub const CSV_SOURCE: &str = "FiscalDataCsv";

const DATASET: &str = "bond rates";
const RATES_PATH: &str = "/services/api/fiscal_service/v2/accounting/od/avg_interest_rates";
const JSON_PAGE_SIZE: &str = "100";
const CSV_PAGE_SIZE: &str = "1000";
/// How far back the CSV export is filtered.
const CSV_LOOKBACK_DAYS: i64 = 400;

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    data: Vec<RawRate>,
}

#[derive(Debug, Deserialize)]
struct RawRate {
    record_date: String,
    security_desc: String,
    avg_interest_rate_amt: Option<String>,
}

#[derive(Clone)]
pub struct FiscalDataClient {
    client: Client,
    json: ProviderSettings,
    csv: ProviderSettings,
    rates: Arc<ResponseCache<Sourced<BondRates>>>,
}

impl FiscalDataClient {
    pub fn new(context: &GatewayContext) -> Self {
        Self {
            client: context.http.clone(),
            json: context.config.fiscal_data.clone(),
            csv: context.config.fiscal_csv.clone(),
            rates: Arc::clone(&context.caches.bond_rates),
        }
    }

    /// Most recent average rate per security title, labelled with the source
    /// that served it.
    pub async fn average_rates(&self) -> Result<Fetched<Sourced<BondRates>>, GatewayError> {
        let key = CacheKey::new("avg_interest_rates", &[]);
        let client = self.clone();
        self.rates
            .get_or_fetch(&key, move || async move { client.fetch_with_fallback().await })
            .await
    }

    async fn fetch_with_fallback(&self) -> Result<Sourced<BondRates>, GatewayError> {
        FallbackChain::new(DATASET)
            .source(JSON_SOURCE, || self.fetch_json())
            .source(CSV_SOURCE, || self.fetch_csv())
            .execute()
            .await
    }

    async fn fetch_json(&self) -> Result<BondRates, GatewayError> {
        let params = [
            ("sort", "-record_date"),
            ("page[size]", JSON_PAGE_SIZE),
            ("fields", "record_date,security_desc,avg_interest_rate_amt"),
        ];
        let url = Url::parse_with_params(&self.json.url(RATES_PATH), &params).map_err(|e| {
            GatewayError::Configuration(format!("Failed to build Fiscal Data URL: {}", e))
        })?;
        debug!("Fiscal Data JSON request: {}", url);

        let response = send(JSON_SOURCE, self.client.get(url).timeout(self.json.timeout)).await?;
        response.error_for_status(JSON_SOURCE)?;
        let payload: RatesResponse = response.json(JSON_SOURCE)?;

        non_empty(JSON_SOURCE, latest_per_title(payload.data))
    }

    async fn fetch_csv(&self) -> Result<BondRates, GatewayError> {
        let cutoff = Utc::now().date_naive() - Duration::days(CSV_LOOKBACK_DAYS);
        let filter = format!("record_date:gte:{}", cutoff);
        let params = [
            ("format", "csv"),
            ("sort", "record_date"),
            ("page[size]", CSV_PAGE_SIZE),
            ("filter", filter.as_str()),
        ];
        let url = Url::parse_with_params(&self.csv.url(RATES_PATH), &params).map_err(|e| {
            GatewayError::Configuration(format!("Failed to build Fiscal Data CSV URL: {}", e))
        })?;
        debug!("Fiscal Data CSV request: {}", url);

        let response = send(CSV_SOURCE, self.client.get(url).timeout(self.csv.timeout)).await?;
        response.error_for_status(CSV_SOURCE)?;

        non_empty(CSV_SOURCE, csv_mirror::parse_rates(&response.body)?)
    }
}

/// Records arrive newest first; keep the first valid one per title.
fn latest_per_title(records: Vec<RawRate>) -> BondRates {
    let mut rates = BondRates::new();
    for record in records {
        if rates.contains_key(&record.security_desc) {
            continue;
        }
        let Ok(record_date) = NaiveDate::parse_from_str(&record.record_date, "%Y-%m-%d") else {
            continue;
        };
        let Some(rate) = record.avg_interest_rate_amt.as_deref().and_then(parse_decimal) else {
            continue;
        };
        rates.insert(record.security_desc, BondRate { record_date, rate });
    }
    rates
}

fn non_empty(source: &str, rates: BondRates) -> Result<BondRates, GatewayError> {
    if rates.is_empty() {
        return Err(GatewayError::NotFound {
            provider: source.to_string(),
            resource: DATASET.to_string(),
        });
    }
    Ok(rates)
}
