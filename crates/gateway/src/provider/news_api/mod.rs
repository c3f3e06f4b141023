//! NewsAPI client (`/v2/everything`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::ProviderSettings;
use crate::context::GatewayContext;
use crate::errors::GatewayError;
use crate::models::{Fetched, NewsArticle};
use crate::provider::http::{send, UpstreamResponse};
use crate::resilience::{CacheKey, ResponseCache};

pub const PROVIDER_ID: &str = "NEWS_API";

pub const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Title NewsAPI substitutes for articles pulled by the publisher.
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    status: String,
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: Option<String>,
}

#[derive(Clone)]
pub struct NewsApiClient {
    client: Client,
    settings: ProviderSettings,
    api_key: Option<String>,
    articles: Arc<ResponseCache<Vec<NewsArticle>>>,
}

impl NewsApiClient {
    pub fn new(context: &GatewayContext) -> Self {
        Self {
            client: context.http.clone(),
            settings: context.config.news.clone(),
            api_key: context.config.news_api_key.clone(),
            articles: Arc::clone(&context.caches.news),
        }
    }

    /// Newest articles matching `query`, at most `limit` (clamped to 1..=100).
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Fetched<Vec<NewsArticle>>, GatewayError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: "empty query".to_string(),
            });
        }
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let key = CacheKey::new("everything", &[("q", &query), ("pageSize", &page_size)]);
        let client = self.clone();
        self.articles
            .get_or_fetch(&key, move || async move {
                client.fetch_articles(&query, &page_size).await
            })
            .await
    }

    async fn fetch_articles(
        &self,
        query: &str,
        page_size: &str,
    ) -> Result<Vec<NewsArticle>, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GatewayError::Configuration("MD_NEWS_API_KEY is not set".to_string())
        })?;

        let params = [
            ("q", query),
            ("pageSize", page_size),
            ("sortBy", "publishedAt"),
            ("language", "en"),
        ];
        let url = Url::parse_with_params(&self.settings.url("/v2/everything"), &params)
            .map_err(|e| GatewayError::Configuration(format!("Failed to build NewsAPI URL: {}", e)))?;
        debug!("NewsAPI request: {}", url);

        let response = send(
            PROVIDER_ID,
            self.client
                .get(url)
                .header("X-Api-Key", api_key)
                .timeout(self.settings.timeout),
        )
        .await?;

        let payload = parse_response(&response)?;
        let articles: Vec<NewsArticle> = payload
            .articles
            .into_iter()
            .filter_map(normalize_article)
            .collect();

        if articles.is_empty() {
            return Err(GatewayError::NotFound {
                provider: PROVIDER_ID.to_string(),
                resource: format!("articles for '{}'", query),
            });
        }
        Ok(articles)
    }
}

/// Classify a NewsAPI response. Errors arrive as
/// `{"status": "error", "code": ..., "message": ...}` alongside a 4xx/5xx.
fn parse_response(response: &UpstreamResponse) -> Result<EverythingResponse, GatewayError> {
    let parsed: Result<EverythingResponse, GatewayError> = response.json(PROVIDER_ID);

    let payload = match parsed {
        Ok(payload) => payload,
        Err(e) => {
            response.error_for_status(PROVIDER_ID)?;
            return Err(e);
        }
    };

    if payload.status == "ok" && response.status.is_success() {
        return Ok(payload);
    }

    let code = payload.code.as_deref().unwrap_or_default();
    let message = payload.message.clone().unwrap_or_else(|| code.to_string());
    match code {
        "rateLimited" | "apiKeyExhausted" => {
            warn!("NewsAPI quota exhausted: {}", message);
            Err(GatewayError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            })
        }
        "apiKeyInvalid" | "apiKeyMissing" | "apiKeyDisabled" => Err(GatewayError::AuthFailure {
            provider: PROVIDER_ID.to_string(),
            message,
        }),
        _ => {
            response.error_for_status(PROVIDER_ID)?;
            Err(GatewayError::UpstreamUnavailable {
                provider: PROVIDER_ID.to_string(),
                message,
            })
        }
    }
}

fn normalize_article(raw: RawArticle) -> Option<NewsArticle> {
    let title = raw.title.filter(|t| !t.trim().is_empty() && t != REMOVED_MARKER)?;
    let url = raw.url.filter(|u| !u.is_empty())?;
    let published_at = raw
        .published_at
        .and_then(|p| DateTime::parse_from_rfc3339(&p).ok())
        .map(|p| p.with_timezone(&Utc));

    Some(NewsArticle {
        title,
        source: raw.source.and_then(|s| s.name),
        url,
        published_at,
        summary: raw.description.filter(|d| !d.is_empty()),
    })
}
