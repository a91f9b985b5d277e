//! Erreurs HTTP du endpoint de lecture

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use deadpool_postgres::PoolError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::PipelineError;

/// Erreur renvoyée par un handler
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Sérialisation de la réponse impossible
    #[error("Failed to serialize response: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Pool saturé ou base injoignable : le service est temporairement indisponible
            ServerError::Pipeline(PipelineError::Pool(
                PoolError::Timeout(_) | PoolError::Backend(_) | PoolError::Closed,
            )) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Corps JSON d'une réponse d'erreur
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error!(status = status.as_u16(), error = %self, "Request failed");

        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
        };

        let json = serde_json::to_string(&body).unwrap_or_else(|_| {
            format!(r#"{{"error":"internal error","status":{}}}"#, status.as_u16())
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
