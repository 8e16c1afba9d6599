use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use etcdman_core::keyspace::{KeyHistory, Listing, RollbackOutcome};
use etcdman_core::KeyNode;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub conn_id: String,
    pub prefix: Option<String>,
    #[serde(default, rename = "includeTTL")]
    pub include_ttl: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyQuery {
    #[serde(default)]
    pub conn_id: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub conn_id: String,
    #[serde(default)]
    pub key: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    #[serde(default)]
    pub conn_id: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    /// Seconds; absent or non-positive means no lease.
    pub ttl: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(default)]
    pub conn_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub conn_id: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    #[serde(default)]
    pub conn_id: String,
    pub key: String,
    pub revision: i64,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: i64,
}

pub async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> ApiResult<Listing> {
    let ks = state.keyspace(&q.conn_id)?;
    Ok(Json(ks.list(q.prefix.as_deref(), q.include_ttl).await?))
}

pub async fn get(State(state): State<AppState>, Query(q): Query<KeyQuery>) -> ApiResult<KeyNode> {
    let ks = state.keyspace(&q.conn_id)?;
    Ok(Json(ks.get(&q.key).await?))
}

pub async fn put(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<StatusCode, ApiError> {
    let ks = state.keyspace(&req.conn_id)?;
    ks.put(&req.key, &req.value, req.ttl).await?;
    Ok(StatusCode::OK)
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<StatusCode, ApiError> {
    let ks = state.keyspace(&req.conn_id)?;
    ks.create(&req.key, &req.value, req.ttl).await?;
    Ok(StatusCode::OK)
}

pub async fn delete(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Deleted> {
    let ks = state.keyspace(&q.conn_id)?;
    let deleted = ks.delete(&q.key).await?;
    Ok(Json(Deleted { deleted }))
}

pub async fn batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchDeleteRequest>,
) -> ApiResult<Deleted> {
    let ks = state.keyspace(&req.conn_id)?;
    let deleted = ks.batch_delete(&req.keys).await?;
    Ok(Json(Deleted {
        deleted: deleted as i64,
    }))
}

pub async fn rename(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<StatusCode, ApiError> {
    let ks = state.keyspace(&req.conn_id)?;
    ks.rename(&req.from, &req.to, req.overwrite).await?;
    Ok(StatusCode::OK)
}

pub async fn copy(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<StatusCode, ApiError> {
    let ks = state.keyspace(&req.conn_id)?;
    ks.copy(&req.from, &req.to, req.overwrite).await?;
    Ok(StatusCode::OK)
}

pub async fn history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<KeyHistory> {
    let ks = state.keyspace(&q.conn_id)?;
    Ok(Json(ks.history(&q.key, q.limit).await?))
}

pub async fn rollback(
    State(state): State<AppState>,
    Json(req): Json<RollbackRequest>,
) -> ApiResult<RollbackOutcome> {
    let ks = state.keyspace(&req.conn_id)?;
    Ok(Json(ks.rollback(&req.key, req.revision).await?))
}
