#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use marketdesk_gateway::{Gateway, GatewayConfig};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Configuration with every provider pointed at `base`. The CSV mirror lives
/// under `{base}/mirror`. `overrides` replace or add variables.
pub fn config(base: &str, overrides: &[(&str, &str)]) -> GatewayConfig {
    let mut vars: HashMap<String, String> = [
        ("MD_ALPHA_VANTAGE_KEYS", "test-key".to_string()),
        ("MD_ALPHA_VANTAGE_BASE_URL", base.to_string()),
        ("MD_FRED_BASE_URL", base.to_string()),
        ("MD_FRED_API_KEY", "fred-key".to_string()),
        ("MD_NEWS_BASE_URL", base.to_string()),
        ("MD_NEWS_API_KEY", "news-key".to_string()),
        ("MD_FISCAL_DATA_BASE_URL", base.to_string()),
        ("MD_FISCAL_CSV_URL", format!("{}/mirror", base)),
        ("MD_BOND_PRICING_BASE_URL", base.to_string()),
        ("MD_BOND_PRICING_TOKEN_URL", format!("{}/oauth/token", base)),
        ("MD_BOND_PRICING_CLIENT_ID", "client-id".to_string()),
        ("MD_BOND_PRICING_CLIENT_SECRET", "client-secret".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for (name, value) in overrides {
        vars.insert(name.to_string(), value.to_string());
    }

    GatewayConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

pub fn gateway(base: &str, overrides: &[(&str, &str)]) -> Gateway {
    Gateway::from_config(config(base, overrides)).unwrap()
}

/// Request counter shared with mock handlers.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn record(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
