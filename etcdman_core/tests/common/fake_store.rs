//! A deterministic **in‑process stand‑in** for an etcd cluster.
//!
//! *  `FakeCluster` keeps a tiny MVCC model: one global revision counter,
//!    the full version list of every key, leases, and a compaction mark.
//! *  `FakeClient` implements `etcdman_core::KvClient` on top of a shared
//!    cluster, the way several real clients talk to one cluster.
//! *  `FakeConnector` hands out `FakeClient`s to the `SessionManager` and
//!    remembers every client it dialed so tests can check which ones were
//!    closed.
//!
//! Faults are injected with `set_unreachable` (every call fails with
//! `Unavailable`), `set_latency` (every call sleeps first), `set_close_delay`,
//! `refuse_dial` and `set_dial_delay`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etcdman_core::client::{
    Compare, CompareOp, CompareTarget, Connector, GetOptions, KeyValue, KvClient, LeaseId, Txn,
    TxnOp,
};
use etcdman_core::{Error, Result};
use etcdman_storage::ConnectionProfile;
use parking_lot::Mutex;

#[derive(Default)]
struct ClusterState {
    revision: i64,
    compacted: i64,
    /// Every version of every key; `None` marks a deletion.
    versions: BTreeMap<String, Vec<(i64, Option<KeyValue>)>>,
    leases: HashMap<LeaseId, i64>,
    next_lease: LeaseId,
}

impl ClusterState {
    fn current(&self, key: &str) -> Option<&KeyValue> {
        self.versions
            .get(key)
            .and_then(|v| v.last())
            .and_then(|(_, kv)| kv.as_ref())
    }

    fn at(&self, key: &str, rev: i64) -> Option<&KeyValue> {
        self.versions.get(key).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|(r, _)| *r <= rev)
                .and_then(|(_, kv)| kv.as_ref())
        })
    }

    fn write_put(&mut self, rev: i64, key: &str, value: &str, lease: Option<LeaseId>) {
        let previous = self.current(key).cloned();
        let kv = KeyValue {
            key: key.to_owned(),
            value: value.to_owned(),
            create_revision: previous.as_ref().map_or(rev, |p| p.create_revision),
            mod_revision: rev,
            version: previous.as_ref().map_or(1, |p| p.version + 1),
            lease: lease.unwrap_or(0),
        };
        self.versions
            .entry(key.to_owned())
            .or_default()
            .push((rev, Some(kv)));
    }

    fn write_delete(&mut self, rev: i64, key: &str) -> i64 {
        if self.current(key).is_none() {
            return 0;
        }
        self.versions
            .entry(key.to_owned())
            .or_default()
            .push((rev, None));
        1
    }

    fn holds(&self, cmp: &Compare) -> bool {
        let current = self.current(&cmp.key);
        let actual = match cmp.target {
            CompareTarget::CreateRevision => current.map_or(0, |kv| kv.create_revision),
            CompareTarget::ModRevision => current.map_or(0, |kv| kv.mod_revision),
        };
        match cmp.op {
            CompareOp::Equal => actual == cmp.value,
            CompareOp::Greater => actual > cmp.value,
            CompareOp::Less => actual < cmp.value,
        }
    }
}

pub struct FakeCluster {
    state: Mutex<ClusterState>,
    unreachable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    close_delay: Mutex<Option<Duration>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ClusterState {
                next_lease: 100,
                ..Default::default()
            }),
            unreachable: AtomicBool::new(false),
            latency: Mutex::new(None),
            close_delay: Mutex::new(None),
        })
    }

    pub fn client(self: &Arc<Self>) -> Arc<FakeClient> {
        Arc::new(FakeClient {
            cluster: Arc::clone(self),
            closed: AtomicBool::new(false),
        })
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Make every client's `close` take this long before it completes.
    pub fn set_close_delay(&self, delay: Option<Duration>) {
        *self.close_delay.lock() = delay;
    }

    /// Leases granted and not yet revoked.
    pub fn live_leases(&self) -> usize {
        self.state.lock().leases.len()
    }

    /// Forget every version older than `rev`, like `etcdctl compact`.
    pub fn compact(&self, rev: i64) {
        self.state.lock().compacted = rev;
    }

    pub fn revision(&self) -> i64 {
        self.state.lock().revision
    }

    /// Write directly, bypassing clients. Returns the new revision.
    pub fn seed(&self, key: &str, value: &str) -> i64 {
        let mut state = self.state.lock();
        state.revision += 1;
        let rev = state.revision;
        state.write_put(rev, key, value, None);
        rev
    }

    /// Advance the global revision with a write to an unrelated key.
    pub fn bump(&self) -> i64 {
        self.seed("/__unrelated__", "noise")
    }

    pub fn kv(&self, key: &str) -> Option<KeyValue> {
        self.state.lock().current(key).cloned()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.kv(key).map(|kv| kv.value)
    }
}

pub struct FakeClient {
    cluster: Arc<FakeCluster>,
    closed: AtomicBool,
}

impl FakeClient {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn ready(&self) -> Result<()> {
        let latency = *self.cluster.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.is_closed() {
            return Err(Error::Unavailable("client closed".into()));
        }
        if self.cluster.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvClient for FakeClient {
    async fn get(&self, key: &str, options: GetOptions) -> Result<Vec<KeyValue>> {
        self.ready().await?;
        let state = self.cluster.state.lock();
        if let Some(rev) = options.revision {
            if rev < state.compacted {
                return Err(Error::Compacted(rev));
            }
            if rev > state.revision {
                return Err(Error::Unavailable("required revision is a future revision".into()));
            }
            return Ok(state.at(key, rev).cloned().into_iter().collect());
        }
        if options.prefix {
            return Ok(state
                .versions
                .keys()
                .filter(|k| k.starts_with(key))
                .filter_map(|k| state.current(k).cloned())
                .collect());
        }
        Ok(state.current(key).cloned().into_iter().collect())
    }

    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<()> {
        self.ready().await?;
        let mut state = self.cluster.state.lock();
        state.revision += 1;
        let rev = state.revision;
        state.write_put(rev, key, value, lease);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<i64> {
        self.ready().await?;
        let mut state = self.cluster.state.lock();
        if state.current(key).is_none() {
            return Ok(0);
        }
        state.revision += 1;
        let rev = state.revision;
        Ok(state.write_delete(rev, key))
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId> {
        self.ready().await?;
        let mut state = self.cluster.state.lock();
        state.next_lease += 1;
        let id = state.next_lease;
        state.leases.insert(id, ttl_secs);
        Ok(id)
    }

    async fn lease_ttl(&self, lease: LeaseId) -> Result<Option<i64>> {
        self.ready().await?;
        Ok(self.cluster.state.lock().leases.get(&lease).copied())
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        self.ready().await?;
        let mut state = self.cluster.state.lock();
        if state.leases.remove(&lease).is_none() {
            return Err(Error::NotFound("requested lease not found".into()));
        }
        // Keys attached to the lease go with it.
        state.revision += 1;
        let rev = state.revision;
        let attached: Vec<String> = state
            .versions
            .keys()
            .filter(|k| state.current(k).is_some_and(|kv| kv.lease == lease))
            .cloned()
            .collect();
        for key in attached {
            state.write_delete(rev, &key);
        }
        Ok(())
    }

    async fn txn(&self, txn: Txn) -> Result<bool> {
        self.ready().await?;
        let mut state = self.cluster.state.lock();
        if !txn.compares.iter().all(|c| state.holds(c)) {
            return Ok(false);
        }
        if txn.success.is_empty() {
            return Ok(true);
        }
        // One transaction, one revision.
        state.revision += 1;
        let rev = state.revision;
        for op in &txn.success {
            match op {
                TxnOp::Put { key, value, lease } => state.write_put(rev, key, value, *lease),
                TxnOp::Delete { key } => {
                    state.write_delete(rev, key);
                }
            }
        }
        Ok(true)
    }

    async fn close(&self) {
        let delay = *self.cluster.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeConnector {
    pub cluster: Arc<FakeCluster>,
    refuse_dial: AtomicBool,
    dial_delay: Mutex<Option<Duration>>,
    dialed: Mutex<Vec<Arc<FakeClient>>>,
    profiles_seen: Mutex<Vec<ConnectionProfile>>,
}

impl FakeConnector {
    pub fn new(cluster: Arc<FakeCluster>) -> Arc<Self> {
        Arc::new(Self {
            cluster,
            refuse_dial: AtomicBool::new(false),
            dial_delay: Mutex::new(None),
            dialed: Mutex::new(Vec::new()),
            profiles_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn refuse_dial(&self, refuse: bool) {
        self.refuse_dial.store(refuse, Ordering::SeqCst);
    }

    /// Dials started after this call take `delay` before handing out a client.
    pub fn set_dial_delay(&self, delay: Option<Duration>) {
        *self.dial_delay.lock() = delay;
    }

    /// Every client handed out so far, oldest first.
    pub fn dialed(&self) -> Vec<Arc<FakeClient>> {
        self.dialed.lock().clone()
    }

    pub fn open_clients(&self) -> usize {
        self.dialed.lock().iter().filter(|c| !c.is_closed()).count()
    }

    pub fn profiles_seen(&self) -> Vec<ConnectionProfile> {
        self.profiles_seen.lock().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        _dial_timeout: Duration,
    ) -> Result<Arc<dyn KvClient>> {
        self.profiles_seen.lock().push(profile.clone());
        if self.refuse_dial.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("dial tcp: connection refused".into()));
        }
        // Let concurrent connects interleave like real dials would.
        let delay = *self.dial_delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        let client = self.cluster.client();
        self.dialed.lock().push(Arc::clone(&client));
        Ok(client)
    }
}
