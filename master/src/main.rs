mod config;
mod dispatcher;
mod error;
mod groups;
mod handlers;
mod registry;
mod runner;
mod state;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,worker=debug,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env();
    info!(
        "datos en {} (timeout por sesión {:?})",
        settings.data_dir.display(),
        settings.item_timeout
    );

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::from_settings(settings);

    // router HTTP
    let app = handlers::build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {bind_addr}"))?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
