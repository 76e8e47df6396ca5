//! HTTP server lifecycle: bind, serve, shut down on ctrl-c.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::api::router::api_router;
use crate::api::types::AppContext;
use crate::config::Config;

/// Bind the configured address and serve until interrupted.
pub async fn run(config: Config) -> io::Result<()> {
    let ctx = AppContext::new(&config);
    let listener = TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");
    serve(listener, ctx).await
}

/// Serve an already-bound listener. Split out so tests can bind port 0.
pub async fn serve(listener: TcpListener, ctx: AppContext) -> io::Result<()> {
    axum::serve(listener, api_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to install shutdown handler"),
    }
}
