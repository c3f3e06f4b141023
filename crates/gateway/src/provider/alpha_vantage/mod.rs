//! Alpha Vantage quote client.
//!
//! Uses the `GLOBAL_QUOTE` endpoint, whose payload keys are numbered
//! (`"01. symbol"`, `"05. price"`, ...). Requests rotate through a pool of API
//! keys; a key that trips the provider's quota is put in cooldown.
//!
//! Note: the free tier allows 25 calls per day and 5 per minute per key.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::ProviderSettings;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{Fetched, Quote};
use crate::provider::http::{parse_decimal, send};
use crate::resilience::{CacheKey, KeyPool, ResponseCache};

pub const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// `GLOBAL_QUOTE` response envelope.
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<HashMap<String, String>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Alpha Vantage client backed by a rotating key pool.
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    settings: ProviderSettings,
    keys: Arc<KeyPool>,
    quotes: Arc<ResponseCache<Quote>>,
}

impl AlphaVantageClient {
    pub fn new(context: &GatewayContext) -> Self {
        Self {
            client: context.http.clone(),
            settings: context.config.alpha_vantage.clone(),
            keys: Arc::clone(&context.quote_keys),
            quotes: Arc::clone(&context.caches.quotes),
        }
    }

    /// Latest quote for `symbol`, served from cache when fresh.
    pub async fn quote(&self, symbol: &str) -> Result<Fetched<Quote>, GatewayError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: "empty symbol".to_string(),
            });
        }

        let key = CacheKey::new("GLOBAL_QUOTE", &[("symbol", &symbol)]);
        let client = self.clone();
        self.quotes
            .get_or_fetch(&key, move || async move { client.fetch_quote(&symbol).await })
            .await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, GatewayError> {
        let api_key = self.keys.next_key();
        let key_index = api_key.index;
        let key_value = api_key.value.to_string();

        let result = self.request_quote(symbol, &key_value).await;
        if matches!(result, Err(GatewayError::RateLimited { .. })) {
            self.keys.cool_down(key_index);
        }
        result
    }

    async fn request_quote(&self, symbol: &str, api_key: &str) -> Result<Quote, GatewayError> {
        let params = [
            ("function", "GLOBAL_QUOTE"),
            ("symbol", symbol),
            ("apikey", api_key),
        ];
        let url = Url::parse_with_params(&self.settings.url("/query"), &params).map_err(|e| {
            GatewayError::Configuration(format!("Failed to build Alpha Vantage URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(api_key, "***")
        );

        let response = send(
            PROVIDER_ID,
            self.client.get(url).timeout(self.settings.timeout),
        )
        .await?;
        response.error_for_status(PROVIDER_ID)?;

        let payload: GlobalQuoteResponse = response.json(PROVIDER_ID)?;
        Self::check_api_error(&payload)?;

        let fields = payload.global_quote.unwrap_or_default();
        if fields.is_empty() {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: symbol.to_string(),
            });
        }

        normalize_quote(&fields).ok_or_else(|| GatewayError::InvalidPayload {
            provider: PROVIDER_ID.to_string(),
            message: format!("Quote for {} has no usable price", symbol),
        })
    }

    /// Classify the provider's in-band error fields.
    ///
    /// Alpha Vantage answers quota exhaustion with HTTP 200 and a `Note` or
    /// `Information` message rather than a 429.
    fn check_api_error(payload: &GlobalQuoteResponse) -> Result<(), GatewayError> {
        if let Some(ref msg) = payload.error_message {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: msg.clone(),
            });
        }

        for msg in [&payload.note, &payload.information].into_iter().flatten() {
            if is_quota_message(msg) {
                return Err(GatewayError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage message: {}", msg);
        }

        if payload.global_quote.is_none() {
            if let Some(msg) = payload.information.as_ref().or(payload.note.as_ref()) {
                return Err(GatewayError::InvalidPayload {
                    provider: PROVIDER_ID.to_string(),
                    message: msg.clone(),
                });
            }
        }

        Ok(())
    }
}

fn is_quota_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("call frequency") || lower.contains("rate limit") || lower.contains("requests per day")
}

/// Look up a numbered field by its name, ignoring the `"NN. "` prefix.
fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields.iter().find_map(|(key, value)| {
        let bare = key.split_once(". ").map_or(key.as_str(), |(_, rest)| rest);
        bare.eq_ignore_ascii_case(name).then_some(value.as_str())
    })
}

/// Map the numbered `GLOBAL_QUOTE` fields to a [`Quote`].
fn normalize_quote(fields: &HashMap<String, String>) -> Option<Quote> {
    let decimal = |name: &str| field(fields, name).and_then(parse_decimal);

    Some(Quote {
        symbol: field(fields, "symbol")?.to_string(),
        price: decimal("price")?,
        open: decimal("open"),
        high: decimal("high"),
        low: decimal("low"),
        volume: decimal("volume"),
        latest_trading_day: field(fields, "latest trading day")
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        previous_close: decimal("previous close"),
        change: decimal("change"),
        change_percent: decimal("change percent"),
        source: PROVIDER_ID.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ibm_fields() -> HashMap<String, String> {
        let json = r#"{
            "01. symbol": "IBM",
            "02. open": "181.0000",
            "03. high": "183.2500",
            "04. low": "180.6100",
            "05. price": "182.5200",
            "06. volume": "3456789",
            "07. latest trading day": "2024-01-15",
            "08. previous close": "181.5900",
            "09. change": "0.9300",
            "10. change percent": "0.5121%"
        }"#;
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_numbered_fields() {
        let quote = normalize_quote(&ibm_fields()).unwrap();

        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, dec!(182.52));
        assert_eq!(quote.high, Some(dec!(183.25)));
        assert_eq!(quote.volume, Some(dec!(3456789)));
        assert_eq!(
            quote.latest_trading_day,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(quote.change_percent, Some(dec!(0.5121)));
        assert_eq!(quote.source, PROVIDER_ID);
    }

    #[test]
    fn test_normalize_requires_price() {
        let mut fields = ibm_fields();
        fields.remove("05. price");
        assert!(normalize_quote(&fields).is_none());
    }

    #[test]
    fn test_field_lookup_ignores_numbering() {
        let fields: HashMap<String, String> =
            [("9. change".to_string(), "1.0".to_string())].into_iter().collect();
        assert_eq!(field(&fields, "change"), Some("1.0"));
        assert_eq!(field(&fields, "change percent"), None);
    }

    #[test]
    fn test_quota_note_is_rate_limit() {
        let payload: GlobalQuoteResponse = serde_json::from_str(
            r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
        )
        .unwrap();
        assert!(matches!(
            AlphaVantageClient::check_api_error(&payload),
            Err(GatewayError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_daily_quota_information_is_rate_limit() {
        let payload: GlobalQuoteResponse = serde_json::from_str(
            r#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#,
        )
        .unwrap();
        assert!(matches!(
            AlphaVantageClient::check_api_error(&payload),
            Err(GatewayError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_error_message_is_not_found() {
        let payload: GlobalQuoteResponse =
            serde_json::from_str(r#"{"Error Message": "Invalid API call."}"#).unwrap();
        assert!(matches!(
            AlphaVantageClient::check_api_error(&payload),
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[test]
    fn test_empty_quote_passes_error_check() {
        let payload: GlobalQuoteResponse =
            serde_json::from_str(r#"{"Global Quote": {}}"#).unwrap();
        assert!(AlphaVantageClient::check_api_error(&payload).is_ok());
    }
}
