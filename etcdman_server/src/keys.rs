//! Choosing the vault key at startup.

use etcdman_storage::VaultKey;
use tracing::{error, info, warn};

pub const SECRET_KEY_ENV: &str = "ETCD_MANAGER_SECRET_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Config,
    Environment,
    Generated,
}

/// Pick the vault key: the configured one, else the environment's, else a
/// fresh random key.
///
/// A key that is present but unusable (bad base64, wrong length) is reported
/// and replaced by a generated one; startup is never blocked on it. Passwords
/// sealed under a previous key will then fail to load.
pub fn resolve_vault_key(configured: Option<&str>, env: Option<&str>) -> (VaultKey, KeySource) {
    let (encoded, source, origin) = match (configured, env) {
        (Some(k), _) if !k.is_empty() => (k, KeySource::Config, "config secretKey"),
        (_, Some(k)) if !k.is_empty() => (k, KeySource::Environment, SECRET_KEY_ENV),
        _ => {
            let key = VaultKey::generate();
            info!("Generated new secret key: {}", key.to_base64());
            warn!(
                "Save this key to keep access to stored passwords after restart \
                 (set {SECRET_KEY_ENV} or secretKey in the config)"
            );
            return (key, KeySource::Generated);
        }
    };

    match VaultKey::from_base64(encoded) {
        Ok(key) => {
            info!("Using secret key from {origin}");
            (key, source)
        }
        Err(e) => {
            error!("Invalid {origin}: {e}; generating a new random secret key");
            (VaultKey::generate(), KeySource::Generated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded() -> String {
        VaultKey::from_bytes([7u8; 32]).to_base64()
    }

    #[test]
    fn config_wins_over_environment() {
        let cfg = encoded();
        let env = VaultKey::generate().to_base64();
        let (key, source) = resolve_vault_key(Some(&cfg), Some(&env));
        assert_eq!(source, KeySource::Config);
        assert_eq!(key.to_base64(), cfg);
    }

    #[test]
    fn environment_used_when_config_empty() {
        let env = encoded();
        let (key, source) = resolve_vault_key(Some(""), Some(&env));
        assert_eq!(source, KeySource::Environment);
        assert_eq!(key.to_base64(), env);
    }

    #[test]
    fn nothing_configured_generates() {
        let (_, source) = resolve_vault_key(None, None);
        assert_eq!(source, KeySource::Generated);
    }

    #[test]
    fn unusable_key_is_replaced() {
        let short = VaultKey::from_bytes([1u8; 32]).to_base64()[..20].to_string();
        for bad in ["not base64!!", short.as_str()] {
            let (_, source) = resolve_vault_key(Some(bad), None);
            assert_eq!(source, KeySource::Generated);
        }
    }
}
