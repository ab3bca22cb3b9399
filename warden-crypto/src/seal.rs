//! Sealing small secrets at rest.
//!
//! A sealed secret is `salt || nonce || ciphertext`. The sealing key is
//! derived from caller-supplied entropy with Argon2id, so the same entropy
//! and parameters are needed to open it again.

use crate::cipher::{self, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, Salt, SALT_SIZE};

/// A secret sealed with [`seal_secret`].
#[derive(Clone, Debug)]
pub struct SealedSecret {
    pub salt: Salt,
    pub data: EncryptedData,
}

impl SealedSecret {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.salt.as_bytes().to_vec();
        bytes.extend_from_slice(&self.data.to_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < SALT_SIZE {
            return Err(CryptoError::Decryption("sealed secret too short".to_string()));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[..SALT_SIZE]);
        Ok(Self {
            salt: Salt::from_bytes(salt),
            data: EncryptedData::from_bytes(&bytes[SALT_SIZE..])?,
        })
    }
}

/// Seals `secret` under a key derived from `entropy` and a fresh salt.
pub fn seal_secret(entropy: &[u8], secret: &[u8], params: &KdfParams) -> CryptoResult<SealedSecret> {
    let salt = Salt::random();
    let key = derive_key(entropy, &salt, params)?;
    let data = cipher::encrypt(&key, secret)?;
    Ok(SealedSecret { salt, data })
}

/// Opens a secret sealed with [`seal_secret`].
pub fn open_secret(entropy: &[u8], sealed: &SealedSecret, params: &KdfParams) -> CryptoResult<Vec<u8>> {
    let key = derive_key(entropy, &sealed.salt, params)?;
    cipher::decrypt(&key, &sealed.data)
}
