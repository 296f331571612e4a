use std::sync::Arc;

use folio_server::{create_router, ChatRelay, RelayConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("folio_server=info,tower_http=info")),
        )
        .init();

    let config = RelayConfig::from_env()?;
    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    info!("Upstream credential loaded");
    info!("Using upstream {} with model {}", config.api_url, config.model);

    let addr = config.addr;
    let relay = Arc::new(ChatRelay::new(config));
    let app = create_router(relay);

    info!("Relay listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
