use std::sync::Arc;

use marketdesk_gateway::{Gateway, GatewayContext};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub gateway: Gateway,
}

pub fn init_tracing() {
    let log_format = std::env::var("MD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let context = GatewayContext::new(config.gateway.clone())?;
    tracing::info!(
        "Macro bundle series: {}",
        context.config.macro_series.join(", ")
    );
    let gateway = Gateway::new(context);
    Ok(Arc::new(AppState { gateway }))
}
