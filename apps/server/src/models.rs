use chrono::NaiveDate;
use marketdesk_gateway::models::{BondRates, Fetched, MacroObservation, NewsArticle};
use serde::Serialize;

/// Public response envelope: the payload's fields plus `fromCache`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    pub from_cache: bool,
}

impl<T: Serialize> From<Fetched<T>> for Envelope<T> {
    fn from(fetched: Fetched<T>) -> Self {
        Self {
            data: fetched.data,
            from_cache: fetched.from_cache,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MacroHistory {
    pub series_id: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub observations: Vec<MacroObservation>,
}

#[derive(Serialize, Debug)]
pub struct NewsFeed {
    pub query: String,
    pub articles: Vec<NewsArticle>,
}

#[derive(Serialize, Debug)]
pub struct BondRateTable {
    pub source: String,
    pub rates: BondRates,
}
