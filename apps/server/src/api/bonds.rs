use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use marketdesk_gateway::models::BondPrice;

use crate::{
    error::ApiResult,
    main_lib::AppState,
    models::{BondRateTable, Envelope},
};

/// Average Treasury rates, labelled with the source that served them.
pub async fn get_bond_rates(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Envelope<BondRateTable>>> {
    let rates = state.gateway.bond_rates().await?;
    Ok(Json(
        rates
            .map(|sourced| BondRateTable {
                source: sourced.source,
                rates: sourced.data,
            })
            .into(),
    ))
}

pub async fn get_bond_price(
    State(state): State<Arc<AppState>>,
    Path(isin): Path<String>,
) -> ApiResult<Json<Envelope<BondPrice>>> {
    let price = state.gateway.bond_price(&isin).await?;
    Ok(Json(price.into()))
}
