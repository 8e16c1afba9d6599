//! AES-256-GCM sealing of stored passwords.
//!
//! One key protects the whole vault. Every `seal` draws a fresh random nonce
//! and embeds it in front of the ciphertext, then the blob is base64 encoded:
//! `base64(nonce[12] || ciphertext || tag[16])`.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::VaultError;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;

/// Why a stored blob could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("failed to decode base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext too short")]
    TooShort,
    #[error("authentication failed")]
    Authentication,
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// The 32-byte vault key. Wiped from memory on drop.
#[derive(Clone)]
pub struct VaultKey(Zeroizing<[u8; KEY_SIZE]>);

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Parse a standard base64 string holding exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| VaultError::InvalidKey(format!("must be base64: {e}")))?,
        );
        let bytes: [u8; KEY_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            VaultError::InvalidKey(format!(
                "must be {KEY_SIZE} bytes, got {}",
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.as_slice())
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    pub fn new(key: &VaultKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt `plaintext` into a self-contained base64 blob.
    pub fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Authenticate and decrypt a blob produced by [`VaultCipher::seal`].
    pub fn open(&self, blob: &str) -> Result<String, CipherError> {
        let data = STANDARD.decode(blob)?;
        if data.len() < NONCE_SIZE {
            return Err(CipherError::TooShort);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
    }
}
