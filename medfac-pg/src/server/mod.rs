//! Serveur HTTP de lecture (axum)

pub mod error;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use deadpool_postgres::Pool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ServerError;

/// État partagé entre les handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub table: String,
}

impl AppState {
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/all-facilities", get(routes::all_facilities))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attend Ctrl+C
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// Sert le routeur sur `listen` jusqu'à ce que `shutdown` se termine
pub async fn serve<F>(listen: SocketAddr, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;

    info!(addr = %listen, table = %state.table, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::{create_pool, DatabaseConfig};

    fn unreachable_state() -> Arc<AppState> {
        let config = DatabaseConfig {
            port: 1,
            connect_timeout: std::time::Duration::from_secs(1),
            ..Default::default()
        };
        Arc::new(AppState::new(create_pool(&config).unwrap(), "medical_facilities"))
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(unreachable_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_storage_failure_is_json_server_error() {
        let response = build_router(unreachable_state())
            .oneshot(Request::get("/all-facilities").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_server_error());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = build_router(unreachable_state())
            .oneshot(Request::get("/facilities").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
