pub mod client;
pub mod core;
pub mod errors;
pub mod keyspace;

// re‑export ergonomic entry points
pub use client::{Connector, KvClient};
pub use crate::core::session_manager::{SessionConfig, SessionManager};
pub use errors::{Error, ErrorKind, Result};
pub use keyspace::{KeyNode, KeySpace};

#[cfg(feature = "etcd")]
pub use client::etcd::{EtcdConnector, EtcdKvClient};
