//! Liveness listener.

use crate::Error;
use axum::{http::StatusCode, routing::get, serve, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

async fn alive() -> StatusCode {
    StatusCode::OK
}

/// Routes answering liveness checks.
pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

/// Bind the liveness listener to `addr`.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = ?listener.local_addr()?, "liveness listener bound");
    Ok(listener)
}

/// Serve liveness checks until the process exits.
pub async fn run(listener: TcpListener) -> Result<(), Error> {
    serve(listener, router().into_make_service()).await?;
    Ok(())
}
