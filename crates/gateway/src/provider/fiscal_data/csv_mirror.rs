//! Parser for the Fiscal Data CSV export of average interest rates.
//!
//! The export is requested in ascending `record_date` order and read from the
//! end, so the first row seen for a security title is its most recent one.
//! Ordering is not re-checked here: a mirror that ignores the `sort`
//! parameter would yield older rates.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::errors::GatewayError;
use crate::models::{BondRate, BondRates};
use crate::provider::http::parse_decimal;

use super::CSV_SOURCE;

/// One CSV row. Header names follow the Fiscal Data export labels.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "Record Date")]
    record_date: String,
    #[serde(rename = "Security Description")]
    security_desc: String,
    #[serde(rename = "Average Interest Rate Amount")]
    avg_interest_rate_amt: String,
}

/// Parse the CSV body into the most recent rate per security title.
pub(super) fn parse_rates(body: &str) -> Result<BondRates, GatewayError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let records: Vec<CsvRecord> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .map_err(|e| GatewayError::InvalidPayload {
            provider: CSV_SOURCE.to_string(),
            message: format!("Failed to parse CSV: {}", e),
        })?;

    let mut rates = BondRates::new();
    for record in records.iter().rev() {
        if rates.contains_key(&record.security_desc) {
            continue;
        }
        let Ok(record_date) = NaiveDate::parse_from_str(&record.record_date, "%Y-%m-%d") else {
            continue;
        };
        let Some(rate) = parse_decimal(&record.avg_interest_rate_amt) else {
            continue;
        };
        rates.insert(
            record.security_desc.clone(),
            BondRate { record_date, rate },
        );
    }

    Ok(rates)
}
