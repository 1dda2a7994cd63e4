//! HTTP front end: `POST /v1/transcribe` and `GET /health`.

pub mod handlers;
pub mod request_id;
pub mod router;
pub mod state;

pub use handlers::{ErrorResponse, HealthResponse};
pub use request_id::{REQUEST_ID_HEADER, RequestId};
pub use router::create_router;
pub use state::AppState;

use tokio::net::TcpListener;

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
