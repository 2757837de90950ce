use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use book_rag_backend::core::config::AppPaths;
use book_rag_backend::core::logging::{self, Console};
use book_rag_backend::server;
use book_rag_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&AppPaths::new(), "server.log", Console::Stdout);

    let state = AppState::initialize().await?;

    let settings = &state.settings.server;
    let bind_addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
