//! Upstream provider clients.
//!
//! Every client follows the same cache-aside flow: build a deterministic
//! cache key from the logical call, serve a fresh cached value if present,
//! otherwise acquire a credential, call the upstream under a bounded timeout,
//! classify the response and normalize it before it is cached.

pub(crate) mod http;

pub mod alpha_vantage;
pub mod bond_pricing;
pub mod fiscal_data;
pub mod fred;
pub mod news_api;

pub use alpha_vantage::AlphaVantageClient;
pub use bond_pricing::BondPricingClient;
pub use fiscal_data::FiscalDataClient;
pub use fred::FredClient;
pub use news_api::NewsApiClient;
