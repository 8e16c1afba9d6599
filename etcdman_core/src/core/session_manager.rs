use crate::client::{Connector, GetOptions, KvClient};
use crate::errors::{Error, Result};
use etcdman_storage::{ConnectionProfile, ConnectionStatus, ConnectionVault};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Reserved key read once after dialing to prove the cluster answers.
pub const HEALTH_PROBE_KEY: &str = "__health__";

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Bound on establishing the transport.
    pub dial_timeout: Duration,
    /// Bound on the liveness read issued before a session is published.
    pub probe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

struct Inner {
    vault: Arc<ConnectionVault>,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Arc<dyn KvClient>>>,
}

/// Owns the live client for each connected profile.
///
/// The map holds at most one client per profile id. Lookups take the read
/// lock and never touch the network; connect and disconnect take the write
/// lock only to swap entries, never across an await. Cloning the manager
/// only bumps a reference count, so it can be handed to every request.
///
/// Each profile moves through `disconnected ⟷ connected ⟷ error`. Only
/// [`SessionManager::connect`] enters `connected`, only
/// [`SessionManager::disconnect`] enters `disconnected`, and any dial or
/// probe failure enters `error`. Nothing reconnects on its own.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        vault: Arc<ConnectionVault>,
        connector: Arc<dyn Connector>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                vault,
                connector,
                config,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn vault(&self) -> &Arc<ConnectionVault> {
        &self.inner.vault
    }

    /// The live client for `id`, if one is published.
    pub fn client(&self, id: &str) -> Option<Arc<dyn KvClient>> {
        self.inner.sessions.read().get(id).cloned()
    }

    /// Like [`SessionManager::client`] but reports a missing session as an error.
    pub fn require_client(&self, id: &str) -> Result<Arc<dyn KvClient>> {
        self.client(id)
            .ok_or_else(|| Error::NotConnected(id.to_owned()))
    }

    pub fn active_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    /// (Re)establish the session for `id`.
    ///
    /// Any existing client for the id is closed first. The new client must
    /// dial and answer a read of [`HEALTH_PROBE_KEY`] within the configured
    /// timeouts before it is published. Failures are recorded as status
    /// `error` and returned once, without retrying.
    pub async fn connect(&self, id: &str) -> Result<ConnectionProfile> {
        let profile = self
            .inner
            .vault
            .get(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_owned()))?;

        let previous = self.inner.sessions.write().remove(id);
        if let Some(previous) = previous {
            info!("Closing existing session for '{}' before reconnecting", id);
            previous.close().await;
        }

        let client = match self
            .inner
            .connector
            .connect(&profile, self.inner.config.dial_timeout)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("Dial failed for '{}': {}", id, e);
                self.record_status(id, ConnectionStatus::Error);
                return Err(e);
            }
        };

        if let Err(e) = self.probe(client.as_ref()).await {
            error!("Health probe failed for '{}': {}", id, e);
            client.close().await;
            self.record_status(id, ConnectionStatus::Error);
            return Err(e);
        }

        // The profile may have been removed while we were dialing. The check
        // and the insert share the sessions lock that `remove_profile` holds
        // while deleting, so a session never outlives its profile.
        let published = {
            let mut sessions = self.inner.sessions.write();
            self.inner
                .vault
                .contains(id)
                .then(|| sessions.insert(id.to_owned(), Arc::clone(&client)))
        };
        match published {
            // A concurrent connect for the same id may have published first;
            // whichever client is displaced gets closed so only one stays live.
            Some(Some(displaced)) => {
                debug!("Replacing concurrently published session for '{}'", id);
                displaced.close().await;
            }
            Some(None) => {}
            None => {
                info!("Connection '{}' was removed while dialing", id);
                client.close().await;
                return Err(Error::ProfileNotFound(id.to_owned()));
            }
        }

        self.record_status(id, ConnectionStatus::Connected);
        info!("Connection '{}' ({}) is live", profile.name, id);
        self.inner
            .vault
            .get(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_owned()))
    }

    /// Close the session for `id` (if any) and mark it `disconnected`.
    ///
    /// Succeeds when no session exists; fails only if the profile is unknown.
    pub async fn disconnect(&self, id: &str) -> Result<ConnectionProfile> {
        self.close_session(id).await;
        self.inner
            .vault
            .set_status(id, ConnectionStatus::Disconnected)?;
        self.inner
            .vault
            .get(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_owned()))
    }

    /// Delete the profile and tear down its session.
    ///
    /// The session is unpublished and the profile deleted under one hold of
    /// the sessions lock; the old client is closed after the lock is released.
    pub async fn remove_profile(&self, id: &str) -> Result<ConnectionProfile> {
        let (removed, session) = {
            let mut sessions = self.inner.sessions.write();
            let session = sessions.remove(id);
            (self.inner.vault.remove(id), session)
        };
        if let Some(session) = session {
            session.close().await;
            info!("Session for '{}' closed", id);
        }
        Ok(removed?)
    }

    /// Close every live session. Used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<dyn KvClient>)> =
            self.inner.sessions.write().drain().collect();
        for (id, client) in drained {
            client.close().await;
            self.record_status(&id, ConnectionStatus::Disconnected);
        }
    }

    async fn close_session(&self, id: &str) {
        let existing = self.inner.sessions.write().remove(id);
        if let Some(existing) = existing {
            existing.close().await;
            info!("Session for '{}' closed", id);
        }
    }

    async fn probe(&self, client: &dyn KvClient) -> Result<()> {
        let timeout = self.inner.config.probe_timeout;
        tokio::time::timeout(timeout, client.get(HEALTH_PROBE_KEY, GetOptions::default()))
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        Ok(())
    }

    /// Status writes are best effort here: the session outcome stands even if
    /// the vault cannot persist it.
    fn record_status(&self, id: &str, status: ConnectionStatus) {
        if let Err(e) = self.inner.vault.set_status(id, status) {
            warn!(
                "Could not record status '{}' for '{}': {}",
                status.as_str(),
                id,
                e
            );
        }
    }
}
