//! JSON configuration for the console server.
//!
//! Every field has a default, so an absent file or a partial one is fine.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use etcdman_core::SessionConfig;
use etcdman_storage::store::VAULT_FILE_NAME;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "etc/etcd-manager.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the connection vault.
    pub data_path: PathBuf,
    /// Base64 of the 32-byte vault key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub static_dir: PathBuf,
    pub dial_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
            data_path: PathBuf::from("./data"),
            secret_key: None,
            cors_origins: Vec::new(),
            static_dir: PathBuf::from("static"),
            dial_timeout_secs: 5,
            probe_timeout_secs: 3,
            request_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn vault_path(&self) -> PathBuf {
        self.data_path.join(VAULT_FILE_NAME)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
