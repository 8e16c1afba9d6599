use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use etcdman_storage::{ConnectionProfile, ConnectionStatus, ProfileUpdate};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::IdQuery;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// A profile as shown to clients: the password is replaced by a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub endpoints: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    pub has_password: bool,
    pub status: ConnectionStatus,
    pub updated_at: i64,
}

impl From<ConnectionProfile> for ProfileView {
    fn from(p: ConnectionProfile) -> Self {
        Self {
            has_password: !p.password.is_empty(),
            id: p.id,
            name: p.name,
            endpoints: p.endpoints,
            username: p.username,
            status: p.status,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddConnection {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Absent fields are left alone.
#[derive(Debug, Deserialize)]
pub struct UpdateConnection {
    pub id: String,
    pub name: Option<String>,
    pub endpoints: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ProfileView>> {
    Json(
        state
            .sessions
            .vault()
            .list()
            .into_iter()
            .map(ProfileView::from)
            .collect(),
    )
}

pub async fn add(
    State(state): State<AppState>,
    Json(req): Json<AddConnection>,
) -> ApiResult<ProfileView> {
    let profile =
        state
            .sessions
            .vault()
            .add(&req.name, req.endpoints, &req.username, &req.password)?;
    info!("Added connection '{}' ({})", profile.name, profile.id);
    Ok(Json(profile.into()))
}

pub async fn update(
    State(state): State<AppState>,
    Json(req): Json<UpdateConnection>,
) -> ApiResult<ProfileView> {
    if req.id.is_empty() {
        return Err(ApiError::bad_request("missing id"));
    }
    let update = ProfileUpdate {
        name: req.name,
        endpoints: req.endpoints,
        username: req.username,
        password: req.password,
    };
    let profile = state.sessions.vault().update(&req.id, update)?;
    Ok(Json(profile.into()))
}

/// Deleting a profile closes its session first.
pub async fn remove(
    State(state): State<AppState>,
    Query(q): Query<IdQuery>,
) -> Result<StatusCode, ApiError> {
    let id = q.require()?;
    let removed = state.sessions.remove_profile(&id).await?;
    info!("Removed connection '{}' ({})", removed.name, id);
    Ok(StatusCode::OK)
}

pub async fn connect(
    State(state): State<AppState>,
    Query(q): Query<IdQuery>,
) -> ApiResult<ProfileView> {
    let id = q.require()?;
    Ok(Json(state.sessions.connect(&id).await?.into()))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Query(q): Query<IdQuery>,
) -> ApiResult<ProfileView> {
    let id = q.require()?;
    Ok(Json(state.sessions.disconnect(&id).await?.into()))
}
