//! Handlers HTTP

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use super::error::ServerError;
use super::AppState;
use crate::assemble;

/// Type MIME des réponses GeoJSON
pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// `GET /all-facilities` : tous les établissements en FeatureCollection
pub async fn all_facilities(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let collection = assemble::all_facilities(&state.pool, &state.table).await?;
    let body = serde_json::to_string(&collection)?;

    Ok(([(header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE)], body).into_response())
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
