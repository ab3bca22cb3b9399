//! Cryptographic primitives for Warden licensing.
//!
//! - Ed25519 keys and signatures used to sign license documents
//! - SHA-256 / SHA-512 digests used for canonical digests and derived tokens
//! - Argon2id key derivation and ChaCha20-Poly1305 sealing, used to protect
//!   the local installation keypair at rest

mod cipher;
mod digest;
mod error;
mod key;
mod seal;
mod signing;

pub use cipher::{decrypt, encrypt, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use digest::{sha256_hex, short_token};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use seal::{open_secret, seal_secret, SealedSecret};
pub use signing::{KeyPair, Signature, SigningKey, VerifyingKey, SECRET_KEY_SIZE};
