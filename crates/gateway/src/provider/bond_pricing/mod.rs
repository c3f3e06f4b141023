//! Reference bond pricing client, authenticated with OAuth2 client
//! credentials.

use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{BondPrice, Fetched};
use crate::provider::http::{decimal_from_value, send};
use crate::resilience::{CacheKey, ResponseCache, TokenManager};

pub const PROVIDER_ID: &str = "BOND_PRICING";

#[derive(Clone)]
pub struct BondPricingClient {
    client: Client,
    settings: ProviderSettings,
    tokens: Option<Arc<TokenManager>>,
    prices: Arc<ResponseCache<BondPrice>>,
}

impl BondPricingClient {
    pub fn new(context: &GatewayContext) -> Self {
        Self {
            client: context.http.clone(),
            settings: context.config.bond_pricing.clone(),
            tokens: context.bond_pricing_tokens.clone(),
            prices: Arc::clone(&context.caches.bond_prices),
        }
    }

    /// Reference price for the bond identified by `isin`.
    pub async fn price(&self, isin: &str) -> Result<Fetched<BondPrice>, GatewayError> {
        let isin = isin.trim().to_uppercase();
        if !is_valid_isin(&isin) {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: format!("invalid ISIN '{}'", isin),
            });
        }

        let key = CacheKey::new("bonds/price", &[("isin", &isin)]);
        let client = self.clone();
        self.prices
            .get_or_fetch(&key, move || async move { client.fetch_price(&isin).await })
            .await
    }

    async fn fetch_price(&self, isin: &str) -> Result<BondPrice, GatewayError> {
        let tokens = self.tokens.as_ref().ok_or_else(|| {
            GatewayError::Configuration("Bond pricing credentials are not configured".to_string())
        })?;
        let token = tokens.get_token().await?;

        let url = self.settings.url(&format!("/v1/bonds/{}/price", isin));
        debug!("Bond pricing request: {}", url);

        let response = send(
            PROVIDER_ID,
            self.client
                .get(&url)
                .bearer_auth(&token)
                .timeout(self.settings.timeout),
        )
        .await?;

        match response.status {
            StatusCode::UNAUTHORIZED => {
                warn!("Bond pricing rejected the bearer token, invalidating it");
                tokens.invalidate(&token);
                return Err(GatewayError::AuthFailure {
                    provider: PROVIDER_ID.to_string(),
                    message: "bearer token rejected".to_string(),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(GatewayError::NotFound {
                    provider: PROVIDER_ID.to_string(),
                    resource: isin.to_string(),
                });
            }
            _ => response.error_for_status(PROVIDER_ID)?,
        }

        if response.body.trim().is_empty() {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: isin.to_string(),
            });
        }
        let payload: Value = response.json(PROVIDER_ID)?;
        normalize_price(isin, &payload)
    }
}

/// First present field among camelCase and snake_case spellings.
fn lookup<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| payload.get(*name).filter(|v| !v.is_null()))
}

fn normalize_price(isin: &str, payload: &Value) -> Result<BondPrice, GatewayError> {
    if payload.as_object().map_or(true, |fields| fields.is_empty()) {
        return Err(GatewayError::NotFound {
            provider: PROVIDER_ID.to_string(),
            resource: isin.to_string(),
        });
    }

    let clean_price = lookup(payload, &["cleanPrice", "clean_price", "price"])
        .and_then(decimal_from_value)
        .ok_or_else(|| GatewayError::InvalidPayload {
            provider: PROVIDER_ID.to_string(),
            message: format!("No clean price for {}", isin),
        })?;

    Ok(BondPrice {
        isin: isin.to_string(),
        clean_price,
        dirty_price: lookup(payload, &["dirtyPrice", "dirty_price"]).and_then(decimal_from_value),
        yield_to_maturity: lookup(payload, &["yieldToMaturity", "yield_to_maturity", "ytm"])
            .and_then(decimal_from_value),
        as_of: lookup(payload, &["asOf", "as_of", "priceDate"])
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok()),
        currency: lookup(payload, &["currency"])
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// ISO 6166: two-letter country prefix, nine alphanumerics and a Luhn check
/// digit computed over the letter-expanded code.
pub fn is_valid_isin(isin: &str) -> bool {
    let bytes = isin.as_bytes();
    if bytes.len() != 12
        || !bytes[..2].iter().all(u8::is_ascii_uppercase)
        || !bytes[2..11].iter().all(u8::is_ascii_alphanumeric)
        || !bytes[11].is_ascii_digit()
    {
        return false;
    }

    let digits: Vec<u32> = isin
        .chars()
        .filter_map(|c| c.to_digit(36))
        .flat_map(|v| {
            if v >= 10 {
                vec![v / 10, v % 10]
            } else {
                vec![v]
            }
        })
        .collect();

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}
