pub mod config;
pub mod error;
pub mod keys;
pub mod routes;

use std::{path::Path, time::Duration};

use axum::http::HeaderValue;
use axum::Router;
use etcdman_core::{KeySpace, SessionManager};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

// re‑export ergonomic entry points
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};

/// Shared by every handler; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(sessions: SessionManager, request_timeout: Duration) -> Self {
        Self {
            sessions,
            request_timeout,
        }
    }

    /// A gateway over the live session of `conn_id`.
    pub fn keyspace(&self, conn_id: &str) -> Result<KeySpace, ApiError> {
        if conn_id.is_empty() {
            return Err(ApiError::bad_request("connId is required"));
        }
        let client = self.sessions.require_client(conn_id)?;
        Ok(KeySpace::new(client, self.request_timeout))
    }
}

/// The full application: API routes, the single-page app fallback, CORS and
/// request tracing.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    routes::router(state)
        .fallback_service(spa(&config.static_dir))
        .layer(cors(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Serve files from `dir`; unknown paths get `index.html` so client-side
/// routes survive a reload.
fn spa(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

fn cors(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unparsable CORS origin {origin:?}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
