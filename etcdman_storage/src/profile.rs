use serde::{Deserialize, Serialize};

/// Last observed state of the session bound to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

/// A named set of endpoints and credentials for one etcd cluster.
///
/// In memory `password` is plaintext. The vault swaps it for a base64
/// AES-GCM blob when the list is written to disk, so the JSON looks like:
/// `{ "id":"…", "name":"prod", "endpoints":["http://10.0.0.1:2379"],
///    "password":"q2F…", "status":"disconnected", "updatedAt":1700000000 }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: String,
    pub name: String,
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub status: ConnectionStatus,
    /// Unix seconds of the last mutation.
    pub updated_at: i64,
}

impl ConnectionProfile {
    /// Credentials are only sent to the cluster when at least one half is set.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

/// Partial edit of a stored profile.
///
/// `None` leaves a field untouched. `Some("")` on `username`/`password`
/// clears it; an empty `name` or endpoint list is rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub endpoints: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.endpoints.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }

    pub(crate) fn apply(self, profile: &mut ConnectionProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(endpoints) = self.endpoints {
            profile.endpoints = endpoints;
        }
        if let Some(username) = self.username {
            profile.username = username;
        }
        if let Some(password) = self.password {
            profile.password = password;
        }
    }
}
