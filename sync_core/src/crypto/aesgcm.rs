//! AES-256-GCM — the alternate credential-encryption scheme.

use crate::errors::SyncError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), SyncError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SyncError::Other(anyhow::anyhow!("AES-GCM encryption failed")))?;

    Ok((nonce_bytes.to_vec(), ciphertext))
}

pub fn open(key: &[u8; 32], body: &[u8]) -> Result<Vec<u8>, SyncError> {
    if body.len() < 12 {
        return Err(SyncError::Other(anyhow::anyhow!("AES-GCM ciphertext too short")));
    }

    let (nonce_bytes, ciphertext) = body.split_at(12);
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SyncError::Other(anyhow::anyhow!("AES-GCM decryption failed")))
}
