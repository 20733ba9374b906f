use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn ok() -> &'static str {
    "OK"
}

pub fn router() -> Router {
    Router::new().route("/", get(ok)).route("/health", get(ok))
}

/// Отдаёт `OK` для мониторинга хостинга, пока не отменён `shutdown`.
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "health endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}
