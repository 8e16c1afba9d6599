#![allow(dead_code)]

// The in-memory cluster is shared with the core crate's tests.
#[path = "../../../etcdman_core/tests/common/fake_store.rs"]
pub mod fake_store;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use etcdman_core::{SessionConfig, SessionManager};
use etcdman_server::{AppState, ServerConfig};
use etcdman_storage::{ConnectionVault, VaultKey};
use fake_store::{FakeCluster, FakeConnector};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub struct TestApp {
    pub dir: TempDir,
    pub cluster: Arc<FakeCluster>,
    pub connector: Arc<FakeConnector>,
    pub sessions: SessionManager,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = ConnectionVault::open(dir.path().join("connections.json"), &VaultKey::generate())
            .expect("open vault");
        let cluster = FakeCluster::new();
        let connector = FakeConnector::new(Arc::clone(&cluster));
        let sessions = SessionManager::new(
            Arc::new(vault),
            connector.clone(),
            SessionConfig {
                dial_timeout: Duration::from_millis(200),
                probe_timeout: Duration::from_millis(200),
            },
        );
        let config = ServerConfig {
            static_dir: dir.path().join("static"),
            ..ServerConfig::default()
        };
        let router = etcdman_server::app(
            AppState::new(sessions.clone(), Duration::from_secs(1)),
            &config,
        );
        Self {
            dir,
            cluster,
            connector,
            sessions,
            router,
        }
    }

    /// Send one request and decode the body as JSON (`Null` when empty).
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("encode body"))
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(req.body(body).expect("request"))
            .await
            .expect("infallible");
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    /// Register a profile over HTTP and connect it; returns its id.
    pub async fn connected_profile(&self) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/connections",
                Some(serde_json::json!({
                    "name": "local",
                    "endpoints": ["http://127.0.0.1:2379"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["id"].as_str().expect("id").to_owned();

        let (status, body) = self
            .call(Method::POST, &format!("/api/connections/connect?id={id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        id
    }
}
