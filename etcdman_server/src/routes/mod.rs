//! HTTP routes. Ids and keys travel in query strings or JSON bodies, never
//! in the path, so keys containing `/` need no escaping.

pub mod connections;
pub mod health;
pub mod kv;

use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::error::ApiError;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::check))
        // ── connections ─────────────────────────────────────────────────────
        .route(
            "/api/connections",
            get(connections::list)
                .post(connections::add)
                .put(connections::update)
                .delete(connections::remove),
        )
        .route("/api/connections/connect", post(connections::connect))
        .route("/api/connections/disconnect", post(connections::disconnect))
        // ── key space ───────────────────────────────────────────────────────
        .route("/api/kv/list", get(kv::list))
        .route(
            "/api/kv",
            get(kv::get).put(kv::put).post(kv::create).delete(kv::delete),
        )
        .route("/api/kv/rename", post(kv::rename))
        .route("/api/kv/copy", post(kv::copy))
        .route("/api/kv/batch-delete", post(kv::batch_delete))
        .route("/api/kv/history", get(kv::history))
        .route("/api/kv/rollback", post(kv::rollback))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: String,
}

impl IdQuery {
    fn require(self) -> Result<String, ApiError> {
        if self.id.is_empty() {
            return Err(ApiError::bad_request("missing id"));
        }
        Ok(self.id)
    }
}
