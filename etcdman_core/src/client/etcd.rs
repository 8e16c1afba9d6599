use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use etcd_client::{
    Client, Compare as EtcdCompare, CompareOp as EtcdCompareOp, ConnectOptions,
    GetOptions as EtcdGetOptions, PutOptions, Txn as EtcdTxn, TxnOp as EtcdTxnOp,
};
use etcdman_storage::ConnectionProfile;
use log::{debug, info};
use parking_lot::Mutex;

use super::{
    Compare, CompareOp, CompareTarget, Connector, GetOptions, KeyValue, KvClient, LeaseId, Txn,
    TxnOp,
};
use crate::errors::{Error, Result};

/// Upper bound on any single RPC issued through a session.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `KvClient` backed by the `etcd-client` gRPC client.
pub struct EtcdKvClient {
    client: Mutex<Option<Client>>,
}

impl EtcdKvClient {
    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(Some(client)),
        }
    }

    /// `Client` is a cheap handle over a shared channel; clone it per call.
    fn client(&self) -> Result<Client> {
        self.client
            .lock()
            .clone()
            .ok_or_else(|| Error::Unavailable("client has been closed".into()))
    }
}

fn map_err(err: etcd_client::Error) -> Error {
    Error::Unavailable(err.to_string())
}

fn convert_kv(kv: &etcd_client::KeyValue) -> KeyValue {
    KeyValue {
        key: String::from_utf8_lossy(kv.key()).into_owned(),
        value: String::from_utf8_lossy(kv.value()).into_owned(),
        create_revision: kv.create_revision(),
        mod_revision: kv.mod_revision(),
        version: kv.version(),
        lease: kv.lease(),
    }
}

fn convert_compare(cmp: Compare) -> EtcdCompare {
    let op = match cmp.op {
        CompareOp::Equal => EtcdCompareOp::Equal,
        CompareOp::Greater => EtcdCompareOp::Greater,
        CompareOp::Less => EtcdCompareOp::Less,
    };
    match cmp.target {
        CompareTarget::CreateRevision => EtcdCompare::create_revision(cmp.key, op, cmp.value),
        CompareTarget::ModRevision => EtcdCompare::mod_revision(cmp.key, op, cmp.value),
    }
}

fn convert_op(op: TxnOp) -> EtcdTxnOp {
    match op {
        TxnOp::Put { key, value, lease } => {
            EtcdTxnOp::put(key, value, lease.map(|id| PutOptions::new().with_lease(id)))
        }
        TxnOp::Delete { key } => EtcdTxnOp::delete(key, None),
    }
}

#[async_trait]
impl KvClient for EtcdKvClient {
    async fn get(&self, key: &str, options: GetOptions) -> Result<Vec<KeyValue>> {
        let mut opts = EtcdGetOptions::new();
        if options.prefix {
            opts = opts.with_prefix();
        }
        if let Some(rev) = options.revision {
            opts = opts.with_revision(rev);
        }
        let resp = self
            .client()?
            .get(key, Some(opts))
            .await
            .map_err(|e| {
                let compacted = matches!(
                    &e,
                    etcd_client::Error::GRpcStatus(status) if status.message().contains("compacted")
                );
                match options.revision {
                    Some(rev) if compacted => Error::Compacted(rev),
                    _ => map_err(e),
                }
            })?;
        Ok(resp.kvs().iter().map(convert_kv).collect())
    }

    async fn put(&self, key: &str, value: &str, lease: Option<LeaseId>) -> Result<()> {
        let opts = lease.map(|id| PutOptions::new().with_lease(id));
        self.client()?
            .put(key, value, opts)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<i64> {
        let resp = self.client()?.delete(key, None).await.map_err(map_err)?;
        Ok(resp.deleted())
    }

    async fn grant_lease(&self, ttl_secs: i64) -> Result<LeaseId> {
        let resp = self
            .client()?
            .lease_grant(ttl_secs, None)
            .await
            .map_err(map_err)?;
        Ok(resp.id())
    }

    async fn lease_ttl(&self, lease: LeaseId) -> Result<Option<i64>> {
        let resp = self
            .client()?
            .lease_time_to_live(lease, None)
            .await
            .map_err(map_err)?;
        Ok((resp.ttl() > 0).then_some(resp.ttl()))
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<()> {
        self.client()?.lease_revoke(lease).await.map_err(map_err)?;
        Ok(())
    }

    async fn txn(&self, txn: Txn) -> Result<bool> {
        let compares: Vec<EtcdCompare> = txn.compares.into_iter().map(convert_compare).collect();
        let ops: Vec<EtcdTxnOp> = txn.success.into_iter().map(convert_op).collect();
        let resp = self
            .client()?
            .txn(EtcdTxn::new().when(compares).and_then(ops))
            .await
            .map_err(map_err)?;
        Ok(resp.succeeded())
    }

    async fn close(&self) {
        // Dropping the last `Client` clone tears down the channel.
        if self.client.lock().take().is_some() {
            debug!("etcd client closed");
        }
    }
}

/// Dials real clusters with the profile's endpoints and credentials.
#[derive(Debug, Clone, Default)]
pub struct EtcdConnector;

#[async_trait]
impl Connector for EtcdConnector {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        dial_timeout: Duration,
    ) -> Result<Arc<dyn KvClient>> {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(dial_timeout)
            .with_timeout(REQUEST_TIMEOUT);
        if profile.has_credentials() {
            options = options.with_user(profile.username.clone(), profile.password.clone());
        }

        info!(
            "Dialing etcd at {:?} for connection '{}'",
            profile.endpoints, profile.name
        );
        let client = tokio::time::timeout(
            dial_timeout,
            Client::connect(&profile.endpoints, Some(options)),
        )
        .await
        .map_err(|_| Error::Timeout(dial_timeout))?
        .map_err(map_err)?;

        Ok(Arc::new(EtcdKvClient::new(client)))
    }
}
