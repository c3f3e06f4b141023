use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use marketdesk_gateway::models::MacroRates;
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{Envelope, MacroHistory},
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

/// Consolidated bundle of the configured series. Failed series are `null`.
pub async fn get_macro_rates(State(state): State<Arc<AppState>>) -> Json<Envelope<MacroRates>> {
    Json(state.gateway.macro_rates().await.into())
}

/// Latest observation, or dated history when `start` or `end` is given.
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(series_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Response> {
    if query.start.is_none() && query.end.is_none() {
        let latest = state.gateway.macro_series(&series_id).await?;
        return Ok(Json(Envelope::from(latest)).into_response());
    }

    if let (Some(start), Some(end)) = (query.start, query.end) {
        if start > end {
            return Err(ApiError::BadRequest(format!(
                "start {} is after end {}",
                start, end
            )));
        }
    }

    let history = state
        .gateway
        .macro_history(&series_id, query.start, query.end)
        .await?;
    if history.data.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No observations for {}",
            series_id
        )));
    }

    let envelope = Envelope::from(history.map(|observations| MacroHistory {
        series_id: series_id.trim().to_uppercase(),
        start: query.start,
        end: query.end,
        observations,
    }));
    Ok(Json(envelope).into_response())
}
