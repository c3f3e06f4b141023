//! MarketDesk gateway
//!
//! Resilient access to the market-data upstreams behind MarketDesk: equity
//! quotes, macro series, news, Treasury average rates and bond reference
//! prices.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |     Gateway      |  one async call per dataset, fan-out for bundles
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | Provider clients | --> |  ResponseCache   |  (TTL cache + single-flight)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |   Credentials    |  KeyPool (rotation) / TokenManager (OAuth2)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  FallbackChain   |  ordered sources for one dataset
//! +------------------+
//! ```
//!
//! State lives in process memory only. Nothing is shared across instances or
//! persisted across restarts.

pub mod config;
pub mod context;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod provider;
pub mod resilience;

pub use config::{GatewayConfig, OAuthSettings, ProviderSettings};
pub use context::{GatewayCaches, GatewayContext};
pub use errors::{FailureClass, GatewayError, SourceFailure};
pub use gateway::Gateway;
pub use models::{Fetched, Sourced};
