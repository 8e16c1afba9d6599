//! The seam between the core and a concrete etcd v3 client.
//!
//! Sessions hold `Arc<dyn KvClient>` and the gateway only speaks this trait,
//! so the same logic runs against a live cluster or an in-process fake.

#[cfg(feature = "etcd")]
pub mod etcd;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use etcdman_storage::ConnectionProfile;

use crate::errors::Result;

pub type LeaseId = i64;

/// One stored entry with its MVCC metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub create_revision: i64,
    pub mod_revision: i64,
    pub version: i64,
    /// `0` when the key is not attached to a lease.
    pub lease: LeaseId,
}

impl KeyValue {
    pub fn lease(&self) -> Option<LeaseId> {
        (self.lease > 0).then_some(self.lease)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Match every key that starts with the requested key.
    pub prefix: bool,
    /// Read as of this revision instead of the latest.
    pub revision: Option<i64>,
}

impl GetOptions {
    pub fn prefix() -> Self {
        Self {
            prefix: true,
            revision: None,
        }
    }

    pub fn at_revision(revision: i64) -> Self {
        Self {
            prefix: false,
            revision: Some(revision),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareTarget {
    CreateRevision,
    ModRevision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    Greater,
    Less,
}

/// A transaction guard: `target(key) op value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compare {
    pub key: String,
    pub target: CompareTarget,
    pub op: CompareOp,
    pub value: i64,
}

impl Compare {
    /// Holds iff `key` does not exist.
    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: CompareTarget::CreateRevision,
            op: CompareOp::Equal,
            value: 0,
        }
    }

    /// Holds iff `key` exists.
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: CompareTarget::CreateRevision,
            op: CompareOp::Greater,
            value: 0,
        }
    }

    /// Holds iff `key` was last written at exactly `revision`.
    pub fn unchanged_since(key: impl Into<String>, revision: i64) -> Self {
        Self {
            key: key.into(),
            target: CompareTarget::ModRevision,
            op: CompareOp::Equal,
            value: revision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    Put {
        key: String,
        value: String,
        lease: Option<LeaseId>,
    },
    Delete {
        key: String,
    },
}

/// Guards plus the operations committed when every guard holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Txn {
    pub compares: Vec<Compare>,
    pub success: Vec<TxnOp>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, compares: impl IntoIterator<Item = Compare>) -> Self {
        self.compares.extend(compares);
        self
    }

    pub fn and_then(mut self, ops: impl IntoIterator<Item = TxnOp>) -> Self {
        self.success.extend(ops);
        self
    }
}

/// A live handle to one cluster.
///
/// Implementations map transport failures to `Error::Unavailable`, compacted
/// reads to `Error::Compacted`, and must be cheap to share between tasks.
#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str, options: GetOptions) -> Result<Vec<KeyValue>>;

    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<()>;

    /// Returns how many keys were removed.
    async fn delete(&self, key: &str) -> Result<i64>;

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId>;

    /// Remaining seconds on `lease`, `None` once it has expired.
    async fn lease_ttl(&self, lease: LeaseId) -> Result<Option<i64>>;

    /// Drop `lease` before its TTL runs out.
    async fn revoke_lease(&self, lease: LeaseId) -> Result<()>;

    /// Commit `txn` atomically. `Ok(false)` means a guard failed and no
    /// operation was applied.
    async fn txn(&self, txn: Txn) -> Result<bool>;

    /// Release the underlying transport. Further calls may fail.
    async fn close(&self);
}

/// Builds live clients from stored profiles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        dial_timeout: Duration,
    ) -> Result<Arc<dyn KvClient>>;
}
