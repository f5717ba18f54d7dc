//! AES-256-CBC — read-only decryption for rows written before the
//! secretbox/AES-GCM schemes existed. `encrypt` must never produce this;
//! it exists solely so old `credential` rows keep decrypting after a
//! master-key rotation migrates new writes onto the current scheme.

use crate::errors::SyncError;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub fn open(key: &[u8; 32], body: &[u8]) -> Result<Vec<u8>, SyncError> {
    if body.len() < 16 {
        return Err(SyncError::Other(anyhow::anyhow!("legacy CBC ciphertext too short")));
    }

    let (iv, ciphertext) = body.split_at(16);

    let decryptor = Aes256CbcDec::new(key.into(), iv.into());

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| SyncError::Other(anyhow::anyhow!("legacy CBC decryption failed")))
}
