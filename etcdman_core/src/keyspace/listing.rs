//! Folding a flat prefix scan into one level of a directory tree.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::{KeyValue, LeaseId};

/// One entry of a directory view. Never stored; derived per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyNode {
    pub key: String,
    /// Present only for leaves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub is_dir: bool,
    /// Remaining lease seconds, when the leaf has a live lease and TTLs were asked for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl KeyNode {
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            is_dir: false,
            ttl: None,
        }
    }

    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            is_dir: true,
            ttl: None,
        }
    }
}

/// A node together with the lease its TTL should be resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedChild {
    pub node: KeyNode,
    pub lease: Option<LeaseId>,
}

/// Group `kvs` by the first path segment after `prefix`.
///
/// `prefix` must already be normalized (leading and trailing `/`). A segment
/// with nothing after it is a leaf; a segment followed by more `/` is a
/// directory. Each segment yields exactly one child, and when a key is both a
/// leaf and the parent of other keys it is reported as a directory. Keys equal
/// to the prefix itself are skipped. Children come back sorted by key.
pub fn group_children(prefix: &str, kvs: &[KeyValue]) -> Vec<ListedChild> {
    let mut children: BTreeMap<&str, ListedChild> = BTreeMap::new();

    for kv in kvs {
        let Some(remain) = kv.key.strip_prefix(prefix) else {
            continue;
        };
        if remain.is_empty() {
            continue;
        }
        let (segment, is_dir) = match remain.find('/') {
            Some(idx) => (&remain[..idx], true),
            None => (remain, false),
        };

        match children.get(segment) {
            Some(existing) if existing.node.is_dir => continue,
            Some(_) if !is_dir => continue,
            _ => {}
        }

        let key = format!("{prefix}{segment}");
        let child = if is_dir {
            ListedChild {
                node: KeyNode::dir(key),
                lease: None,
            }
        } else {
            ListedChild {
                node: KeyNode::leaf(key, kv.value.clone()),
                lease: kv.lease(),
            }
        };
        children.insert(segment, child);
    }

    children.into_values().collect()
}
