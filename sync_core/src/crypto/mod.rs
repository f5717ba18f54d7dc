//! Credential encryption at rest: API keys are never stored or logged in
//! plaintext. New credentials are sealed with
//! XSalsa20-Poly1305 secretbox; AES-256-GCM is carried as a second
//! authenticated scheme so an operator can migrate without a flag day.
//! AES-256-CBC is kept *read-only* for rows written before this scheme
//! existed — `encrypt` never produces it.
//!
//! Ciphertexts are stored as `base64(tag_byte || nonce/iv || ciphertext)`.
//! The tag byte lets `decrypt` dispatch without the caller knowing which
//! scheme produced a given row.

mod aesgcm;
mod legacy;
mod secretbox;
pub mod store;

use crate::errors::SyncError;
use base64::Engine;
use zeroize::Zeroizing;

const TAG_SECRETBOX: u8 = 1;
const TAG_AESGCM: u8 = 2;
const TAG_LEGACY_CBC: u8 = 3;

/// 32-byte master key, held only in memory and zeroized on drop. Loaded
/// once at startup from whatever the deployment's secret store provides —
/// how the key reaches the process is outside this crate's concern.
pub struct MasterKey(Zeroizing<[u8; 32]>);

impl MasterKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SyncError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SyncError::ConfigurationMissing("master key must be 32 bytes".into()))?;
        Ok(Self::from_bytes(arr))
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

pub struct CredentialCipher {
    key: MasterKey,
}

impl CredentialCipher {
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// Encrypts `plaintext`, always using the current scheme (secretbox).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, SyncError> {
        let (nonce, ciphertext) = secretbox::seal(self.key.as_bytes(), plaintext.as_bytes())?;

        let mut out = Vec::with_capacity(1 + nonce.len() + ciphertext.len());
        out.push(TAG_SECRETBOX);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(out))
    }

    /// Decrypts a stored value, dispatching on its tag byte so rows sealed
    /// under any supported scheme — including the legacy CBC one — decrypt
    /// transparently.
    pub fn decrypt(&self, stored: &str) -> Result<Zeroizing<String>, SyncError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(stored)
            .map_err(|e| SyncError::Other(anyhow::anyhow!("credential is not valid base64: {e}")))?;

        let (&tag, body) = raw
            .split_first()
            .ok_or_else(|| SyncError::Other(anyhow::anyhow!("empty credential ciphertext")))?;

        let plaintext = match tag {
            TAG_SECRETBOX => secretbox::open(self.key.as_bytes(), body)?,
            TAG_AESGCM => aesgcm::open(self.key.as_bytes(), body)?,
            TAG_LEGACY_CBC => legacy::open(self.key.as_bytes(), body)?,
            other => {
                return Err(SyncError::Other(anyhow::anyhow!(
                    "unknown credential cipher tag: {other}"
                )))
            }
        };

        let text = String::from_utf8(plaintext)
            .map_err(|e| SyncError::Other(anyhow::anyhow!("decrypted credential is not UTF-8: {e}")))?;

        Ok(Zeroizing::new(text))
    }

    /// Encrypts using AES-256-GCM instead of the default secretbox scheme.
    /// Exposed for operators migrating a fleet onto the alternate cipher
    /// without touching every row in one pass.
    pub fn encrypt_with_aesgcm(&self, plaintext: &str) -> Result<String, SyncError> {
        let (nonce, ciphertext) = aesgcm::seal(self.key.as_bytes(), plaintext.as_bytes())?;

        let mut out = Vec::with_capacity(1 + nonce.len() + ciphertext.len());
        out.push(TAG_AESGCM);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(out))
    }
}
