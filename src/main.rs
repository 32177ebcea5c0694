use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use healthtrack_gateway::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let cfg = GatewayConfig::from_env();
    info!(
        target: "gateway",
        "healthtrack gateway starting: RUST_LOG='{}', http_port={}, api_base_url='{}'",
        rust_log, cfg.http_port, cfg.api.base_url
    );

    healthtrack_gateway::server::run(cfg).await
}
