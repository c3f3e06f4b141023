use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use marketdesk_gateway::models::Quote;

use crate::{error::ApiResult, main_lib::AppState, models::Envelope};

/// Latest quote for one symbol.
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Envelope<Quote>>> {
    let quote = state.gateway.quote(&symbol).await?;
    Ok(Json(quote.into()))
}
