use std::{net::SocketAddr, sync::Arc};

use engine_server::{build_router, config::load_settings, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let app = build_router(Arc::new(AppState::new(&settings)));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, template_code = %settings.template_code, "engine server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
