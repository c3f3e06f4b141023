mod common;

use std::collections::HashMap;
use std::time::Duration;

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::NaiveDate;
use common::{gateway, serve, Hits};
use marketdesk_gateway::{Gateway, GatewayError};
use rust_decimal_macros::dec;
use serde_json::json;

const OBSERVATIONS_PATH: &str = "/fred/series/observations";

fn fred_router(hits: Hits) -> Router {
    Router::new().route(
        OBSERVATIONS_PATH,
        get(move |Query(params): Query<HashMap<String, String>>| async move {
            hits.record();
            if params.get("api_key").map(String::as_str) != Some("fred-key") {
                return (StatusCode::BAD_REQUEST, Json(json!({
                    "error_code": 400,
                    "error_message": "Bad Request.  The value for variable api_key is not registered."
                })))
                .into_response();
            }

            let series = params.get("series_id").cloned().unwrap_or_default();
            match series.as_str() {
                "DGS2" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
                "NOPE" => (StatusCode::BAD_REQUEST, Json(json!({
                    "error_code": 400,
                    "error_message": "Bad Request.  The series does not exist."
                })))
                .into_response(),
                "SLOW" => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Json(json!({ "observations": [{"date": "2024-01-12", "value": "1.00"}] }))
                        .into_response()
                }
                _ => {
                    let mut observations = vec![
                        json!({"date": "2024-01-10", "value": "4.10"}),
                        json!({"date": "2024-01-11", "value": "."}),
                        json!({"date": "2024-01-12", "value": "4.25"}),
                    ];
                    if params.get("sort_order").map(String::as_str) == Some("desc") {
                        observations.reverse();
                    }
                    Json(json!({ "observations": observations })).into_response()
                }
            }
        }),
    )
}

#[tokio::test]
async fn latest_skips_missing_values() {
    let base = serve(fred_router(Hits::default())).await;

    let latest = gateway(&base, &[]).macro_series("dgs10").await.unwrap();

    assert_eq!(latest.data.series_id, "DGS10");
    assert_eq!(latest.data.value, dec!(4.25));
    assert_eq!(latest.data.date, NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
}

#[tokio::test]
async fn history_is_ascending() {
    let base = serve(fred_router(Hits::default())).await;
    let start = NaiveDate::from_ymd_opt(2024, 1, 1);

    let history = gateway(&base, &[])
        .macro_history("DFF", start, None)
        .await
        .unwrap();

    let dates: Vec<String> = history.data.iter().map(|o| o.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-10", "2024-01-12"]);
}

#[tokio::test]
async fn fan_out_isolates_failing_series() {
    let hits = Hits::default();
    let base = serve(fred_router(hits.clone())).await;
    let gateway = gateway(&base, &[]);

    let bundle = gateway.macro_rates().await;

    let rates = &bundle.data.rates;
    assert_eq!(rates.len(), 4);
    assert_eq!(bundle.data.available(), 3);
    assert_eq!(bundle.data.missing(), vec!["DGS2"]);
    assert!(rates["DGS2"].is_none());
    assert_eq!(rates["DFF"].as_ref().unwrap().value, dec!(4.25));
    assert!(!bundle.from_cache);
    assert_eq!(hits.count(), 4);

    // Successful series are cached; the failed one is retried.
    let again = gateway.macro_rates().await;
    assert!(again.from_cache);
    assert_eq!(again.data.available(), 3);
    assert_eq!(hits.count(), 5);
}

/// Gateway whose FRED calls give up after 200ms.
fn impatient_gateway(base: &str, overrides: &[(&str, &str)]) -> Gateway {
    let mut config = common::config(base, overrides);
    config.fred.timeout = Duration::from_millis(200);
    Gateway::from_config(config).unwrap()
}

#[tokio::test]
async fn slow_series_times_out() {
    let base = serve(fred_router(Hits::default())).await;

    let err = impatient_gateway(&base, &[])
        .macro_series("SLOW")
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Timeout { ref provider } if provider == "FRED"));
}

#[tokio::test]
async fn timed_out_series_fails_only_its_branch() {
    let base = serve(fred_router(Hits::default())).await;
    let gateway = impatient_gateway(&base, &[("MD_MACRO_SERIES", "DFF,SLOW,DGS10")]);

    let bundle = gateway.macro_rates().await;

    assert_eq!(bundle.data.rates.len(), 3);
    assert_eq!(bundle.data.missing(), vec!["SLOW"]);
    assert_eq!(bundle.data.rates["DFF"].as_ref().unwrap().value, dec!(4.25));
    assert_eq!(bundle.data.rates["DGS10"].as_ref().unwrap().value, dec!(4.25));
}

#[tokio::test]
async fn unknown_series_is_not_found() {
    let base = serve(fred_router(Hits::default())).await;

    let err = gateway(&base, &[]).macro_series("NOPE").await.unwrap_err();

    assert!(matches!(err, GatewayError::NotFound { .. }));
}

#[tokio::test]
async fn missing_api_key_is_a_configuration_error() {
    let hits = Hits::default();
    let base = serve(fred_router(hits.clone())).await;
    let config = common::config(&base, &[]);
    let config = marketdesk_gateway::GatewayConfig {
        fred_api_key: None,
        ..config
    };
    let gateway = marketdesk_gateway::Gateway::from_config(config).unwrap();

    let err = gateway.macro_series("DFF").await.unwrap_err();

    assert!(matches!(err, GatewayError::Configuration(_)));
    assert_eq!(hits.count(), 0);
}
