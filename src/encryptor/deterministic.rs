//! Deterministic AES-256-GCM column encryption
//!
//! Same cipher and stored form as the randomized strategy, but the nonce is
//! synthesized from a SHA-256 digest of the key and the canonical plaintext
//! under a domain-separation prefix. Equal plaintexts therefore produce
//! equal ciphertexts, which lets equality predicates rewrite directly
//! against the cipher column. The tradeoff is the classic one: equality
//! patterns in the stored data become observable.

use crate::encryptor::aes_gcm as gcm;
use crate::encryptor::error::CryptoResult;
use crate::encryptor::{Encryptor, EncryptionKey, AES_NONCE_SIZE};
use crate::value::SqlValue;
use aes_gcm::Aes256Gcm;
use sha2::{Digest, Sha256};

/// Algorithm id for the deterministic strategy
pub const ALGORITHM_DETERMINISTIC_AES_256_GCM: &str = "deterministic-aes-256-gcm";

/// Domain-separation prefix for synthetic nonce derivation
const NONCE_DERIVATION_CONTEXT: &[u8] = b"sqlcloak_synthetic_nonce_v1:";

/// Deterministic AES-256-GCM strategy
pub struct DeterministicAesEncryptor {
    key: EncryptionKey,
    cipher: Aes256Gcm,
}

impl DeterministicAesEncryptor {
    /// Create a strategy from key material
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = gcm::cipher_for(&key);
        Self { key, cipher }
    }

    /// Derive the synthetic nonce for a canonical plaintext
    fn synthetic_nonce(&self, canonical: &[u8]) -> [u8; AES_NONCE_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(NONCE_DERIVATION_CONTEXT);
        hasher.update(self.key.as_bytes());
        hasher.update(canonical);
        let digest = hasher.finalize();

        let mut nonce = [0u8; AES_NONCE_SIZE];
        nonce.copy_from_slice(&digest[..AES_NONCE_SIZE]);
        nonce
    }
}

impl Encryptor for DeterministicAesEncryptor {
    fn algorithm(&self) -> &str {
        ALGORITHM_DETERMINISTIC_AES_256_GCM
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue> {
        let canonical = plaintext.to_canonical_bytes();
        let nonce = self.synthetic_nonce(&canonical);
        gcm::seal(&self.cipher, &nonce, &canonical)
    }

    fn decrypt(&self, ciphertext: &SqlValue) -> CryptoResult<SqlValue> {
        let canonical = gcm::open(&self.cipher, ciphertext)?;
        SqlValue::from_canonical_bytes(&canonical)
    }
}

impl std::fmt::Debug for DeterministicAesEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterministicAesEncryptor")
            .field("algorithm", &self.algorithm())
            .field("key", &self.key)
            .finish()
    }
}
