//! Directory-style views and guarded mutations over a flat etcd key space.
//!
//! Every multi-step mutation is a single etcd transaction, so other writers
//! observe either the old state or the new one. Every call is bounded by the
//! deadline the gateway was built with; dropping a call cancels the in-flight
//! request.

pub mod history;
pub mod listing;
pub mod validation;

use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, info};
use serde::Serialize;

use crate::client::{Compare, GetOptions, KeyValue, KvClient, LeaseId, Txn, TxnOp};
use crate::errors::{Error, Result};

pub use history::{effective_limit, KeyHistory, KeyRevisionSnapshot, HISTORY_NOTE};
pub use listing::KeyNode;
use validation::{normalize_prefix, validate_key, validate_value};

pub const ROLLBACK_NOTE: &str =
    "restores the value only; lease and revision metadata are not restored";

/// One level of the virtual directory tree under `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub prefix: String,
    pub children: Vec<KeyNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub key: String,
    /// The revision whose value was written back.
    pub revision: i64,
    pub value: String,
    pub note: &'static str,
}

/// Key-space operations over one live session.
///
/// Stateless apart from the client and the per-call deadline; build one per
/// request.
pub struct KeySpace {
    client: Arc<dyn KvClient>,
    deadline: Duration,
}

impl KeySpace {
    pub fn new(client: Arc<dyn KvClient>, deadline: Duration) -> Self {
        Self { client, deadline }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| Error::Timeout(self.deadline))?
    }

    /// Remaining seconds of `lease`; lookup failures just mean "no TTL".
    async fn resolve_ttl(&self, lease: Option<LeaseId>) -> Option<i64> {
        let lease = lease?;
        match self.client.lease_ttl(lease).await {
            Ok(ttl) => ttl,
            Err(e) => {
                debug!("TTL lookup for lease {lease} failed: {e}");
                None
            }
        }
    }

    async fn lease_for(&self, ttl: Option<i64>) -> Result<Option<LeaseId>> {
        match ttl {
            Some(ttl) if ttl > 0 => Ok(Some(self.client.grant_lease(ttl).await?)),
            _ => Ok(None),
        }
    }

    /// Revoke a lease nothing ended up attached to. A failure only leaves the
    /// lease to expire on its own.
    async fn release_lease(&self, lease: LeaseId) {
        if let Err(e) = self.client.revoke_lease(lease).await {
            debug!("Revoking unused lease {lease} failed: {e}");
        }
    }

    async fn get_one(&self, key: &str) -> Result<Option<KeyValue>> {
        Ok(self
            .client
            .get(key, GetOptions::default())
            .await?
            .into_iter()
            .next())
    }

    /// Immediate children of `prefix` (default `/`).
    pub async fn list(&self, prefix: Option<&str>, include_ttl: bool) -> Result<Listing> {
        let prefix = normalize_prefix(prefix.unwrap_or_default())?;
        self.bounded(async {
            let kvs = self.client.get(&prefix, GetOptions::prefix()).await?;
            let mut children = Vec::new();
            for child in listing::group_children(&prefix, &kvs) {
                let mut node = child.node;
                if include_ttl {
                    node.ttl = self.resolve_ttl(child.lease).await;
                }
                children.push(node);
            }
            debug!("Listed {} child(ren) under {}", children.len(), prefix);
            Ok(Listing {
                prefix: prefix.clone(),
                children,
            })
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<KeyNode> {
        validate_key(key)?;
        self.bounded(async {
            let kv = self
                .get_one(key)
                .await?
                .ok_or_else(|| Error::NotFound("key not found".into()))?;
            let mut node = KeyNode::leaf(key, kv.value.clone());
            node.ttl = self.resolve_ttl(kv.lease()).await;
            Ok(node)
        })
        .await
    }

    /// Write `value` only if `key` does not exist yet.
    ///
    /// The existence check and the write are one transaction guarded on the
    /// key's create revision being zero.
    pub async fn create(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.bounded(async {
            let lease = self.lease_for(ttl).await?;
            let txn = Txn::new()
                .when([Compare::absent(key)])
                .and_then([TxnOp::Put {
                    key: key.to_owned(),
                    value: value.to_owned(),
                    lease,
                }]);
            if !self.client.txn(txn).await? {
                if let Some(lease) = lease {
                    self.release_lease(lease).await;
                }
                return Err(Error::Conflict("key already exists".into()));
            }
            info!("Created {key}");
            Ok(())
        })
        .await
    }

    /// Unconditional write. A positive `ttl` attaches a fresh lease.
    pub async fn put(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;
        self.bounded(async {
            let lease = self.lease_for(ttl).await?;
            self.client.put(key, value, lease).await
        })
        .await
    }

    /// Remove one key by exact path. Returns how many keys were deleted.
    pub async fn delete(&self, key: &str) -> Result<i64> {
        validate_key(key)?;
        self.bounded(self.client.delete(key)).await
    }

    /// Delete every key in `keys` in one transaction.
    ///
    /// All keys are validated before anything is sent.
    pub async fn batch_delete(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Err(Error::Validation(
                "keys array is required and cannot be empty".into(),
            ));
        }
        for key in keys {
            validate_key(key).map_err(|e| Error::Validation(format!("invalid key {key}: {e}")))?;
        }

        let txn = Txn::new().and_then(keys.iter().map(|key| TxnOp::Delete { key: key.clone() }));
        self.bounded(self.client.txn(txn)).await?;
        info!("Batch deleted {} key(s)", keys.len());
        Ok(keys.len())
    }

    /// Move `from` to `to`, keeping the source's lease.
    pub async fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        self.transfer(from, to, overwrite, true).await
    }

    /// Duplicate `from` at `to`, keeping the source's lease.
    pub async fn copy(&self, from: &str, to: &str, overwrite: bool) -> Result<()> {
        self.transfer(from, to, overwrite, false).await
    }

    /// Shared body of rename and copy.
    ///
    /// The source is read once, then one transaction asserts it is still at
    /// the revision we read (so it exists and the copied value is current)
    /// and, unless `overwrite`, that the destination is absent. On a failed
    /// guard nothing is written.
    async fn transfer(&self, from: &str, to: &str, overwrite: bool, move_source: bool) -> Result<()> {
        validate_key(from).map_err(|e| Error::Validation(format!("invalid source key: {e}")))?;
        validate_key(to)
            .map_err(|e| Error::Validation(format!("invalid destination key: {e}")))?;
        if from == to {
            return Err(Error::Validation(
                "source and destination must differ".into(),
            ));
        }

        self.bounded(async {
            let source = self
                .get_one(from)
                .await?
                .ok_or_else(|| Error::NotFound("source key not found".into()))?;

            let mut compares = vec![Compare::unchanged_since(from, source.mod_revision)];
            if !overwrite {
                compares.push(Compare::absent(to));
            }
            let mut ops = vec![TxnOp::Put {
                key: to.to_owned(),
                value: source.value.clone(),
                lease: source.lease(),
            }];
            if move_source {
                ops.push(TxnOp::Delete {
                    key: from.to_owned(),
                });
            }

            if !self.client.txn(Txn::new().when(compares).and_then(ops)).await? {
                let msg = if overwrite {
                    "source missing or modified concurrently"
                } else {
                    "destination exists or source modified concurrently"
                };
                return Err(Error::Conflict(msg.into()));
            }
            info!(
                "{} {from} -> {to}",
                if move_source { "Renamed" } else { "Copied" }
            );
            Ok(())
        })
        .await
    }

    /// Best-effort past values of `key`, newest first.
    ///
    /// See [`history::reconstruct`] for how `limit` bounds the walk. The
    /// result can miss values the cluster has compacted.
    pub async fn history(&self, key: &str, limit: Option<usize>) -> Result<KeyHistory> {
        validate_key(key)?;
        let limit = effective_limit(limit);
        self.bounded(async {
            let current = self
                .get_one(key)
                .await?
                .ok_or_else(|| Error::NotFound("key not found".into()))?;
            let history = history::reconstruct(self.client.as_ref(), key, current, limit).await?;
            Ok(KeyHistory {
                key: key.to_owned(),
                history,
                note: HISTORY_NOTE,
            })
        })
        .await
    }

    /// Write the value `key` had at `revision` as a new revision.
    ///
    /// This is not a point-in-time restore: the lease and the revision
    /// numbers of the old entry are not brought back, only its value.
    pub async fn rollback(&self, key: &str, revision: i64) -> Result<RollbackOutcome> {
        validate_key(key)?;
        if revision <= 0 {
            return Err(Error::Validation("revision must be positive".into()));
        }
        self.bounded(async {
            let not_found =
                || Error::NotFound("key not found at specified revision (may be compacted)".into());
            let old = match self.client.get(key, GetOptions::at_revision(revision)).await {
                Ok(kvs) => kvs.into_iter().next().ok_or_else(not_found)?,
                Err(Error::Compacted(_)) => return Err(not_found()),
                Err(e) => return Err(e),
            };

            self.client.put(key, &old.value, None).await?;
            info!("Rolled {key} back to the value of revision {revision}");
            Ok(RollbackOutcome {
                key: key.to_owned(),
                revision,
                value: old.value,
                note: ROLLBACK_NOTE,
            })
        })
        .await
    }
}
