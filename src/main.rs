//! Stride relay server binary.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use stride_relay::config::RelayConfig;
use stride_relay::data::MemoryStore;
use stride_relay::relay::Relay;
use stride_relay::server::{router, AppState};
use stride_relay::tools::default_registry;
use stride_relay::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stride_relay=info,tower_http=info")),
        )
        .init();

    let config = RelayConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();

    let data = Arc::new(MemoryStore::new());
    let tools = default_registry(data);
    let relay = Relay::new(UpstreamClient::new(config)?, tools);

    let app = router(AppState { relay });
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "stride relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
