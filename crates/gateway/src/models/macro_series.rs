use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// One dated value of a macroeconomic series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroObservation {
    pub series_id: String,
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Consolidated bundle of the latest value of several series.
///
/// A series whose fetch failed is present with `None`, so consumers see
/// which metrics are missing rather than a shorter map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MacroRates {
    pub rates: BTreeMap<String, Option<MacroObservation>>,
}

impl MacroRates {
    /// Number of series that produced a value.
    pub fn available(&self) -> usize {
        self.rates.values().filter(|v| v.is_some()).count()
    }

    /// Series ids that failed.
    pub fn missing(&self) -> Vec<&str> {
        self.rates
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
