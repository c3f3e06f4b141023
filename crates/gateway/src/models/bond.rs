use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Average interest rate for one class of government security.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondRate {
    pub record_date: NaiveDate,
    pub rate: Decimal,
}

/// Most recent rate per security title (e.g. `"Treasury Bills"`).
pub type BondRates = BTreeMap<String, BondRate>;

/// Reference price for a single bond.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondPrice {
    pub isin: String,
    pub clean_price: Decimal,
    pub dirty_price: Option<Decimal>,
    pub yield_to_maturity: Option<Decimal>,
    pub as_of: Option<NaiveDate>,
    pub currency: Option<String>,
}
