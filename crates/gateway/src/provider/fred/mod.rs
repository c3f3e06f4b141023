//! FRED (Federal Reserve Economic Data) client.
//!
//! Serves the latest observation of a series and dated history. FRED marks
//! missing observations with `"."`; those are skipped.

use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::ProviderSettings;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{Fetched, MacroObservation};
use crate::provider::http::{parse_decimal, send, UpstreamResponse};
use crate::resilience::{CacheKey, ResponseCache};

pub const PROVIDER_ID: &str = "FRED";

/// How many recent observations to request when looking for the latest value.
const LATEST_WINDOW: &str = "10";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorResponse {
    error_code: Option<u16>,
    error_message: Option<String>,
}

#[derive(Clone)]
pub struct FredClient {
    client: Client,
    settings: ProviderSettings,
    api_key: Option<String>,
    latest: Arc<ResponseCache<MacroObservation>>,
    history: Arc<ResponseCache<Vec<MacroObservation>>>,
}

impl FredClient {
    pub fn new(context: &GatewayContext) -> Self {
        Self {
            client: context.http.clone(),
            settings: context.config.fred.clone(),
            api_key: context.config.fred_api_key.clone(),
            latest: Arc::clone(&context.caches.macro_latest),
            history: Arc::clone(&context.caches.macro_history),
        }
    }

    /// Most recent non-missing observation of `series_id`.
    pub async fn latest(&self, series_id: &str) -> Result<Fetched<MacroObservation>, GatewayError> {
        let series_id = normalize_series_id(series_id)?;
        let key = CacheKey::new("series/observations/latest", &[("series_id", &series_id)]);
        let client = self.clone();
        self.latest
            .get_or_fetch(&key, move || async move { client.fetch_latest(&series_id).await })
            .await
    }

    /// Observations of `series_id` in ascending date order, optionally bounded.
    pub async fn history(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Fetched<Vec<MacroObservation>>, GatewayError> {
        let series_id = normalize_series_id(series_id)?;
        let start_param = start.map(|d| d.to_string()).unwrap_or_default();
        let end_param = end.map(|d| d.to_string()).unwrap_or_default();
        let key = CacheKey::new(
            "series/observations",
            &[
                ("series_id", &series_id),
                ("observation_start", &start_param),
                ("observation_end", &end_param),
            ],
        );

        let client = self.clone();
        self.history
            .get_or_fetch(&key, move || async move {
                client.fetch_history(&series_id, start, end).await
            })
            .await
    }

    async fn fetch_latest(&self, series_id: &str) -> Result<MacroObservation, GatewayError> {
        let observations = self
            .fetch_observations(
                series_id,
                &[("sort_order", "desc"), ("limit", LATEST_WINDOW)],
            )
            .await?;

        observations
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: format!("no recent observations for {}", series_id),
            })
    }

    async fn fetch_history(
        &self,
        series_id: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<MacroObservation>, GatewayError> {
        let start = start.map(|d| d.to_string());
        let end = end.map(|d| d.to_string());

        let mut extra = vec![("sort_order", "asc")];
        if let Some(ref start) = start {
            extra.push(("observation_start", start.as_str()));
        }
        if let Some(ref end) = end {
            extra.push(("observation_end", end.as_str()));
        }

        self.fetch_observations(series_id, &extra).await
    }

    async fn fetch_observations(
        &self,
        series_id: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<MacroObservation>, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::Configuration("MD_FRED_API_KEY is not set".to_string())
        })?;

        let mut params = vec![
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
        ];
        params.extend_from_slice(extra);

        let url = Url::parse_with_params(&self.settings.url("/fred/series/observations"), &params)
            .map_err(|e| GatewayError::Configuration(format!("Failed to build FRED URL: {}", e)))?;
        debug!("FRED request: {}", url.as_str().replace(api_key, "***"));

        let response = send(
            PROVIDER_ID,
            self.client.get(url).timeout(self.settings.timeout),
        )
        .await?;
        check_api_error(&response, series_id)?;

        let payload: ObservationsResponse = response.json(PROVIDER_ID)?;
        Ok(normalize_observations(series_id, payload.observations))
    }
}

fn normalize_series_id(series_id: &str) -> Result<String, GatewayError> {
    let id = series_id.trim().to_uppercase();
    if id.is_empty() {
        return Err(GatewayError::NotFound {
            provider: PROVIDER_ID.to_string(),
            resource: "empty series id".to_string(),
        });
    }
    Ok(id)
}

/// FRED reports errors as `{error_code, error_message}` with a matching
/// HTTP status; an unknown series is a 400.
fn check_api_error(response: &UpstreamResponse, series_id: &str) -> Result<(), GatewayError> {
    if response.status.is_success() {
        return Ok(());
    }

    let detail: Option<FredErrorResponse> = serde_json::from_str(&response.body).ok();
    let code = detail.as_ref().and_then(|d| d.error_code);
    let message = detail.and_then(|d| d.error_message).unwrap_or_default();

    if code == Some(429) || response.status == StatusCode::TOO_MANY_REQUESTS {
        return Err(GatewayError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        });
    }
    if response.status == StatusCode::BAD_REQUEST && message.contains("does not exist") {
        return Err(GatewayError::NotFound {
            provider: PROVIDER_ID.to_string(),
            resource: series_id.to_string(),
        });
    }
    if response.status == StatusCode::BAD_REQUEST && message.to_lowercase().contains("api_key") {
        return Err(GatewayError::AuthFailure {
            provider: PROVIDER_ID.to_string(),
            message,
        });
    }

    response.error_for_status(PROVIDER_ID)
}

fn normalize_observations(series_id: &str, raw: Vec<RawObservation>) -> Vec<MacroObservation> {
    raw.into_iter()
        .filter_map(|obs| {
            let value = parse_decimal(&obs.value)?;
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok()?;
            Some(MacroObservation {
                series_id: series_id.to_string(),
                date,
                value,
            })
        })
        .collect()
}
