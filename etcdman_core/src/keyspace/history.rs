//! Best-effort reconstruction of a key's past values from MVCC revisions.
//!
//! etcd keeps no per-key audit log, only the global revision history that
//! survives compaction. Walking backward one revision at a time and reading
//! the key "as of" each one recovers earlier values, but anything compacted
//! away is silently missing.

use serde::Serialize;

use crate::client::{GetOptions, KeyValue, KvClient};
use crate::errors::{Error, Result};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;

pub const HISTORY_NOTE: &str = "history may be incomplete if etcd has compacted old revisions";

/// The key as seen at one probed revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRevisionSnapshot {
    /// The revision the read was issued at.
    pub revision: i64,
    pub value: String,
    pub mod_revision: i64,
    pub create_revision: i64,
    pub version: i64,
}

impl KeyRevisionSnapshot {
    fn from_kv(revision: i64, kv: KeyValue) -> Self {
        Self {
            revision,
            value: kv.value,
            mod_revision: kv.mod_revision,
            create_revision: kv.create_revision,
            version: kv.version,
        }
    }
}

/// Newest-first snapshots of one key, plus a standing caveat about gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyHistory {
    pub key: String,
    pub history: Vec<KeyRevisionSnapshot>,
    pub note: &'static str,
}

/// Out-of-range or missing limits fall back to [`DEFAULT_HISTORY_LIMIT`].
pub fn effective_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(n) if (1..=MAX_HISTORY_LIMIT).contains(&n) => n,
        _ => DEFAULT_HISTORY_LIMIT,
    }
}

/// Walk from `current.mod_revision` down toward `current.create_revision`.
///
/// `limit` caps the number of revisions read, the current one included, so
/// it also caps the number of snapshots. Revisions with no visible key or
/// that were compacted are skipped; a read whose value equals the most
/// recently recorded snapshot is skipped too.
pub(crate) async fn reconstruct(
    client: &dyn KvClient,
    key: &str,
    current: KeyValue,
    limit: usize,
) -> Result<Vec<KeyRevisionSnapshot>> {
    let current_rev = current.mod_revision;
    let create_rev = current.create_revision;
    let mut history = vec![KeyRevisionSnapshot::from_kv(current_rev, current)];

    for step in 1..limit as i64 {
        let rev = current_rev - step;
        if rev < create_rev {
            break;
        }

        let kv = match client.get(key, GetOptions::at_revision(rev)).await {
            Ok(kvs) => match kvs.into_iter().next() {
                Some(kv) => kv,
                None => continue,
            },
            Err(Error::Compacted(_)) => continue,
            Err(e) => return Err(e),
        };

        let unchanged = history
            .last()
            .is_some_and(|last| last.value == kv.value);
        if !unchanged {
            history.push(KeyRevisionSnapshot::from_kv(rev, kv));
        }
    }

    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped_to_a_sane_window() {
        assert_eq!(effective_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(effective_limit(Some(0)), DEFAULT_HISTORY_LIMIT);
        assert_eq!(effective_limit(Some(101)), DEFAULT_HISTORY_LIMIT);
        assert_eq!(effective_limit(Some(1)), 1);
        assert_eq!(effective_limit(Some(100)), 100);
    }
}
