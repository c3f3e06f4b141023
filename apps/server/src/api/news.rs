use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use marketdesk_gateway::provider::news_api::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{Envelope, NewsFeed},
};

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    q: Option<String>,
    limit: Option<u32>,
}

pub async fn search_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Json<Envelope<NewsFeed>>> {
    let q = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'q' is required".to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let articles = state.gateway.news(&q, limit).await?;
    Ok(Json(
        articles
            .map(|articles| NewsFeed { query: q, articles })
            .into(),
    ))
}
