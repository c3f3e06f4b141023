use std::sync::Arc;

use anyhow::Context;
use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, main_lib::AppState};

pub mod bonds;
pub mod health;
pub mod macro_rates;
pub mod news;
pub mod quotes;

pub fn app_router(state: Arc<AppState>, config: &Config) -> anyhow::Result<Router> {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .map(|o| o.parse().with_context(|| format!("Invalid CORS origin: {}", o)))
            .collect::<anyhow::Result<Vec<HeaderValue>>>()?;
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/quotes/{symbol}", get(quotes::get_quote))
        .route("/macro/rates", get(macro_rates::get_macro_rates))
        .route("/macro/series/{series_id}", get(macro_rates::get_series))
        .route("/news", get(news::search_news))
        .route("/bonds/rates", get(bonds::get_bond_rates))
        .route("/bonds/{isin}/price", get(bonds::get_bond_price));

    Ok(Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http()))
}
