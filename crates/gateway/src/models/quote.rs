use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Latest quote for a listed symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub latest_trading_day: Option<NaiveDate>,
    pub previous_close: Option<Decimal>,
    pub change: Option<Decimal>,
    /// Percent change, e.g. `0.5123` for `"0.5123%"`
    pub change_percent: Option<Decimal>,
    pub source: String,
}
