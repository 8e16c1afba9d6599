use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::cipher::{VaultCipher, VaultKey};
use crate::errors::{Result, VaultError};
use crate::profile::{ConnectionProfile, ConnectionStatus, ProfileUpdate};
use crate::validation::{validate_endpoints, validate_name};

pub const VAULT_FILE_NAME: &str = "connections.json";

/// Durable, encrypted table of connection profiles.
///
/// The in-memory list is the source of truth while the process runs. Every
/// mutation rewrites the whole list to a temp file in the same directory and
/// renames it over the vault file, so readers of the file only ever see a
/// complete old or complete new state. Passwords are sealed with the vault
/// key on the way out and opened on the way in.
///
/// Lookups share the read lock. A mutation holds the write lock for the whole
/// read-modify-persist sequence.
pub struct ConnectionVault {
    path: PathBuf,
    cipher: VaultCipher,
    profiles: RwLock<Vec<ConnectionProfile>>,
}

impl ConnectionVault {
    /// Open (or create) the vault file at `path`.
    ///
    /// A missing file starts an empty vault and writes it immediately. A file
    /// that fails to parse, or any password that fails to authenticate under
    /// `key`, aborts the load.
    pub fn open(path: impl Into<PathBuf>, key: &VaultKey) -> Result<Self> {
        let path = path.into();
        let cipher = VaultCipher::new(key);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| VaultError::persistence(parent, e))?;
        }

        let profiles = match fs::read(&path) {
            Ok(bytes) => {
                let stored: Vec<ConnectionProfile> =
                    serde_json::from_slice(&bytes).map_err(|source| VaultError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                let profiles = unseal_all(&cipher, stored)?;
                info!("Loaded {} connection(s) from {:?}", profiles.len(), path);
                profiles
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No vault at {:?}, creating an empty one", path);
                write_atomically(&path, &cipher, &[])?;
                Vec::new()
            }
            Err(e) => return Err(VaultError::persistence(&path, e)),
        };

        Ok(Self {
            path,
            cipher,
            profiles: RwLock::new(profiles),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of every profile, in insertion order.
    pub fn list(&self) -> Vec<ConnectionProfile> {
        self.profiles.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<ConnectionProfile> {
        self.profiles.read().iter().find(|p| p.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.read().iter().any(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Store a new profile under a freshly generated id.
    ///
    /// On `Persistence` errors the profile is already in memory; treat the
    /// call as failed because the disk may lag until the next good write.
    pub fn add(
        &self,
        name: &str,
        endpoints: Vec<String>,
        username: &str,
        password: &str,
    ) -> Result<ConnectionProfile> {
        validate_name(name)?;
        validate_endpoints(&endpoints)?;

        let profile = ConnectionProfile {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            endpoints,
            username: username.to_owned(),
            password: password.to_owned(),
            status: ConnectionStatus::Disconnected,
            updated_at: Utc::now().timestamp(),
        };

        let mut profiles = self.profiles.write();
        profiles.push(profile.clone());
        self.persist(&profiles)?;
        debug!("Added connection '{}' ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Apply a partial edit and refresh `updated_at`.
    ///
    /// An edit with no fields set returns the stored profile untouched.
    pub fn update(&self, id: &str, update: ProfileUpdate) -> Result<ConnectionProfile> {
        if update.is_empty() {
            return self
                .get(id)
                .ok_or_else(|| VaultError::NotFound(id.to_owned()));
        }

        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(endpoints) = &update.endpoints {
            validate_endpoints(endpoints)?;
        }

        let mut profiles = self.profiles.write();
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_owned()))?;
        update.apply(profile);
        profile.updated_at = Utc::now().timestamp();
        let updated = profile.clone();

        self.persist(&profiles)?;
        debug!("Updated connection {id}");
        Ok(updated)
    }

    pub fn remove(&self, id: &str) -> Result<ConnectionProfile> {
        let mut profiles = self.profiles.write();
        let idx = profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_owned()))?;
        let removed = profiles.remove(idx);
        self.persist(&profiles)?;
        debug!("Removed connection {id}");
        Ok(removed)
    }

    /// Record the latest session state. Touches only `status` and `updated_at`.
    pub fn set_status(&self, id: &str, status: ConnectionStatus) -> Result<()> {
        let mut profiles = self.profiles.write();
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| VaultError::NotFound(id.to_owned()))?;
        profile.status = status;
        profile.updated_at = Utc::now().timestamp();
        self.persist(&profiles)
    }

    fn persist(&self, profiles: &[ConnectionProfile]) -> Result<()> {
        write_atomically(&self.path, &self.cipher, profiles).inspect_err(|e| {
            warn!("Vault write failed, memory and disk may differ: {e}");
        })
    }
}

fn unseal_all(
    cipher: &VaultCipher,
    stored: Vec<ConnectionProfile>,
) -> Result<Vec<ConnectionProfile>> {
    stored
        .into_iter()
        .map(|mut profile| {
            if !profile.password.is_empty() {
                profile.password =
                    cipher
                        .open(&profile.password)
                        .map_err(|e| VaultError::Decryption {
                            id: profile.id.clone(),
                            reason: e.to_string(),
                        })?;
            }
            Ok(profile)
        })
        .collect()
}

/// Seal passwords, serialize, write to a sibling temp file, fsync, rename.
///
/// The temp file is created `0600` on Unix, so the vault is only readable
/// by the owning user after the rename.
fn write_atomically(path: &Path, cipher: &VaultCipher, profiles: &[ConnectionProfile]) -> Result<()> {
    let sealed = profiles
        .iter()
        .map(|p| {
            let mut stored = p.clone();
            if !stored.password.is_empty() {
                stored.password = cipher.seal(&stored.password)?;
            }
            Ok(stored)
        })
        .collect::<Result<Vec<_>>>()?;

    let json = serde_json::to_vec_pretty(&sealed)
        .map_err(|e| VaultError::persistence(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| VaultError::persistence(dir, e))?;
    tmp.write_all(&json)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| VaultError::persistence(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| VaultError::persistence(path, e.error))?;
    Ok(())
}
