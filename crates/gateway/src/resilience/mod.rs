//! Resilience layer shared by every provider client.
//!
//! - [`TtlCache`]: per-entry expiry with lazy eviction
//! - [`SingleFlight`]: coalesces concurrent duplicate calls
//! - [`ResponseCache`]: cache-aside lookup built from the two above
//! - [`KeyPool`]: round-robin key rotation with cooldown
//! - [`TokenManager`]: OAuth2 client-credentials token cache
//! - [`FallbackChain`]: ordered primary/fallback sources
//! - [`settle_all`]: best-effort concurrent fan-out

mod fallback;
mod fanout;
mod key_pool;
mod response_cache;
mod single_flight;
mod token_manager;
mod ttl_cache;

pub use fallback::FallbackChain;
pub use fanout::settle_all;
pub use key_pool::{ApiKey, KeyPool};
pub use response_cache::{CacheKey, ResponseCache};
pub use single_flight::SingleFlight;
pub use token_manager::{
    ClientCredentials, TokenFetcher, TokenGrant, TokenManager, DEFAULT_TOKEN_SKEW,
};
pub use ttl_cache::TtlCache;
