//! XSalsa20-Poly1305 secretbox — the default credential-encryption scheme.

use crate::errors::SyncError;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use rand::RngCore;

pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), SyncError> {
    let cipher = XSalsa20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SyncError::Other(anyhow::anyhow!("secretbox encryption failed")))?;

    Ok((nonce_bytes.to_vec(), ciphertext))
}

pub fn open(key: &[u8; 32], body: &[u8]) -> Result<Vec<u8>, SyncError> {
    if body.len() < 24 {
        return Err(SyncError::Other(anyhow::anyhow!("secretbox ciphertext too short")));
    }

    let (nonce_bytes, ciphertext) = body.split_at(24);
    let cipher = XSalsa20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SyncError::Other(anyhow::anyhow!("secretbox decryption failed")))
}
