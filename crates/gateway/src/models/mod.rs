//! Normalized data models returned by the gateway.
//!
//! Every upstream payload is mapped into one of these stable schemas before
//! it is cached or returned, whatever field names the upstream used.

mod bond;
mod macro_series;
mod news;
mod quote;

pub use bond::{BondPrice, BondRate, BondRates};
pub use macro_series::{MacroObservation, MacroRates};
pub use news::NewsArticle;
pub use quote::Quote;

use serde::Serialize;

/// A gateway result plus whether it was served from the TTL cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub data: T,
    pub from_cache: bool,
}

impl<T> Fetched<T> {
    pub fn fresh(data: T) -> Self {
        Self {
            data,
            from_cache: false,
        }
    }

    pub fn cached(data: T) -> Self {
        Self {
            data,
            from_cache: true,
        }
    }

    /// Transform the payload, keeping the cache flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            from_cache: self.from_cache,
        }
    }
}

/// Data produced by a fallback chain, labelled with the source that served it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: String,
}
