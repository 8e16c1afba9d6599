use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_connections: Option<usize>,
}

pub async fn check(State(state): State<AppState>) -> Json<Health> {
    let active = state.sessions.active_count();
    Json(Health {
        status: "ok",
        active_connections: (active > 0).then_some(active),
    })
}
