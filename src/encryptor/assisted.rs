//! Assisted AES-256-GCM: randomized storage plus a searchable assist value
//!
//! The primary encryption is randomized AES-256-GCM, so the stored
//! ciphertext leaks nothing about equality. Searchability comes from the
//! assist pipeline: `derive_assist` is a keyed SHA-256 digest of the
//! plaintext (pure, hex-encoded), and `encode_assist` wraps the digest in
//! deterministic AES-256-GCM for storage. The composed assist value is a
//! deterministic function of the plaintext, so equality predicates rewrite
//! to exact comparisons on the assist column.

use crate::encryptor::aes_gcm as gcm;
use crate::encryptor::error::{CryptoError, CryptoResult};
use crate::encryptor::{AssistedEncryptor, Encryptor, EncryptionKey, AES_NONCE_SIZE};
use crate::value::SqlValue;
use aes_gcm::{
    aead::{AeadCore, OsRng},
    Aes256Gcm,
};
use sha2::{Digest, Sha256};

/// Algorithm id for the assisted strategy
pub const ALGORITHM_ASSISTED_AES_256_GCM: &str = "assisted-aes-256-gcm";

/// Domain-separation prefix for assist digest derivation
const ASSIST_DERIVATION_CONTEXT: &[u8] = b"sqlcloak_assist_digest_v1:";

/// Domain-separation prefix for the assist-slot synthetic nonce
const ASSIST_NONCE_CONTEXT: &[u8] = b"sqlcloak_assist_nonce_v1:";

/// Assisted strategy: randomized primary, deterministic assist pipeline
pub struct AssistedAesEncryptor {
    key: EncryptionKey,
    cipher: Aes256Gcm,
}

impl AssistedAesEncryptor {
    /// Create a strategy from key material
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = gcm::cipher_for(&key);
        Self { key, cipher }
    }

    fn keyed_digest(&self, context: &[u8], input: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(context);
        hasher.update(self.key.as_bytes());
        hasher.update(input);
        let digest = hasher.finalize();

        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

impl Encryptor for AssistedAesEncryptor {
    fn algorithm(&self) -> &str {
        ALGORITHM_ASSISTED_AES_256_GCM
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn encrypt(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut nonce_bytes = [0u8; AES_NONCE_SIZE];
        nonce_bytes.copy_from_slice(&nonce);
        gcm::seal(&self.cipher, &nonce_bytes, &plaintext.to_canonical_bytes())
    }

    fn decrypt(&self, ciphertext: &SqlValue) -> CryptoResult<SqlValue> {
        let canonical = gcm::open(&self.cipher, ciphertext)?;
        SqlValue::from_canonical_bytes(&canonical)
    }
}

impl AssistedEncryptor for AssistedAesEncryptor {
    fn derive_assist(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue> {
        if plaintext.is_null() {
            return Err(CryptoError::InvalidInput(
                "cannot derive an assist value from NULL".to_string(),
            ));
        }
        let digest =
            self.keyed_digest(ASSIST_DERIVATION_CONTEXT, &plaintext.to_canonical_bytes());
        Ok(SqlValue::Text(hex::encode(digest)))
    }

    fn encode_assist(&self, assist: &SqlValue) -> CryptoResult<SqlValue> {
        let canonical = assist.to_canonical_bytes();
        let digest = self.keyed_digest(ASSIST_NONCE_CONTEXT, &canonical);
        let mut nonce = [0u8; AES_NONCE_SIZE];
        nonce.copy_from_slice(&digest[..AES_NONCE_SIZE]);
        gcm::seal(&self.cipher, &nonce, &canonical)
    }
}

impl std::fmt::Debug for AssistedAesEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistedAesEncryptor")
            .field("algorithm", &self.algorithm())
            .field("key", &self.key)
            .finish()
    }
}
