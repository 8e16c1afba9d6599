use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use etcdman_core::{EtcdConnector, SessionManager};
use etcdman_server::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use etcdman_server::keys::{resolve_vault_key, SECRET_KEY_ENV};
use etcdman_server::AppState;
use etcdman_storage::ConnectionVault;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Web console for etcd clusters.
#[derive(Parser, Debug)]
#[command(name = "etcd-manager", version)]
struct Args {
    /// JSON config file; a missing file means defaults
    #[arg(short = 'f', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Listen address
    #[arg(long)]
    host: Option<String>,
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,
    /// Directory holding connections.json
    #[arg(long)]
    data_path: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_path) = self.data_path {
            config.data_path = data_path;
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────────
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(&args.config)?;
    args.apply(&mut config);

    let env_key = std::env::var(SECRET_KEY_ENV).ok();
    let (key, _) = resolve_vault_key(config.secret_key.as_deref(), env_key.as_deref());

    let vault_path = config.vault_path();
    let vault = ConnectionVault::open(&vault_path, &key)
        .with_context(|| format!("opening connection vault {}", vault_path.display()))?;
    info!("Loaded {} connection(s) from {}", vault.len(), vault.path().display());

    let sessions = SessionManager::new(
        Arc::new(vault),
        Arc::new(EtcdConnector),
        config.session_config(),
    );
    let app = etcdman_server::app(
        AppState::new(sessions.clone(), config.request_timeout()),
        &config,
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("etcd-manager listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing {} session(s)", sessions.active_count());
    sessions.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
