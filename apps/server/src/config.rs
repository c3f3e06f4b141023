use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use marketdesk_gateway::GatewayConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub cache_purge_interval: Duration,
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("MD_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid MD_LISTEN_ADDR")?;
        let cors_allow = lookup("MD_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = lookup("MD_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|| "30000".into())
            .parse()
            .context("Invalid MD_REQUEST_TIMEOUT_MS")?;
        let purge_secs: u64 = lookup("MD_CACHE_PURGE_SECS")
            .unwrap_or_else(|| "600".into())
            .parse()
            .context("Invalid MD_CACHE_PURGE_SECS")?;
        let gateway = GatewayConfig::from_lookup(&lookup)?;

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            cache_purge_interval: Duration::from_secs(purge_secs),
            gateway,
        })
    }
}
