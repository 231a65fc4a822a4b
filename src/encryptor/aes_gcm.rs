//! Randomized AES-256-GCM column encryption
//!
//! The stored form is `base64(nonce || ciphertext)` as a text scalar, with a
//! fresh OS-random nonce per call. Equal plaintexts produce different
//! ciphertexts, so columns encrypted this way are not directly searchable;
//! pair them with an assist encryptor when equality predicates are needed.

use crate::encryptor::error::{CryptoError, CryptoResult};
use crate::encryptor::{Encryptor, EncryptionKey, AES_NONCE_SIZE};
use crate::value::SqlValue;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};

/// Algorithm id for the randomized strategy
pub const ALGORITHM_AES_256_GCM: &str = "aes-256-gcm";

/// Build the AES-256-GCM cipher for a key
pub(crate) fn cipher_for(key: &EncryptionKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt canonical plaintext bytes under the given nonce
///
/// Returns the stored text form `base64(nonce || ciphertext)`.
pub(crate) fn seal(
    cipher: &Aes256Gcm,
    nonce_bytes: &[u8; AES_NONCE_SIZE],
    plaintext: &[u8],
) -> CryptoResult<SqlValue> {
    let nonce = Nonce::from_slice(nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption {
            message: format!("AES-GCM encryption failed: {}", e),
        })?;

    let mut framed = Vec::with_capacity(AES_NONCE_SIZE + ciphertext.len());
    framed.extend_from_slice(nonce_bytes);
    framed.extend_from_slice(&ciphertext);
    Ok(SqlValue::Text(general_purpose::STANDARD.encode(framed)))
}

/// Decrypt a stored text value back to canonical plaintext bytes
pub(crate) fn open(cipher: &Aes256Gcm, stored: &SqlValue) -> CryptoResult<Vec<u8>> {
    let encoded = match stored {
        SqlValue::Text(s) => s,
        other => {
            return Err(CryptoError::MalformedCiphertext {
                message: format!("expected text ciphertext, got {:?}", other),
            })
        }
    };

    let framed = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedCiphertext {
            message: format!("ciphertext is not valid base64: {}", e),
        })?;
    if framed.len() < AES_NONCE_SIZE {
        return Err(CryptoError::MalformedCiphertext {
            message: format!(
                "ciphertext too short: {} bytes, need at least {}",
                framed.len(),
                AES_NONCE_SIZE
            ),
        });
    }

    let (nonce_bytes, ciphertext) = framed.split_at(AES_NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| CryptoError::Decryption {
            message: format!("AES-GCM decryption/verification failed: {}", e),
        })
}

/// Randomized AES-256-GCM strategy
pub struct AesGcmEncryptor {
    key: EncryptionKey,
    cipher: Aes256Gcm,
}

impl AesGcmEncryptor {
    /// Create a strategy from key material
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = cipher_for(&key);
        Self { key, cipher }
    }

    /// Generate a fresh random nonce
    fn generate_nonce() -> [u8; AES_NONCE_SIZE] {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut nonce_bytes = [0u8; AES_NONCE_SIZE];
        nonce_bytes.copy_from_slice(&nonce);
        nonce_bytes
    }
}

impl Encryptor for AesGcmEncryptor {
    fn algorithm(&self) -> &str {
        ALGORITHM_AES_256_GCM
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn encrypt(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue> {
        let nonce = Self::generate_nonce();
        seal(&self.cipher, &nonce, &plaintext.to_canonical_bytes())
    }

    fn decrypt(&self, ciphertext: &SqlValue) -> CryptoResult<SqlValue> {
        let canonical = open(&self.cipher, ciphertext)?;
        SqlValue::from_canonical_bytes(&canonical)
    }
}

impl std::fmt::Debug for AesGcmEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncryptor")
            .field("algorithm", &self.algorithm())
            .field("key", &self.key)
            .finish()
    }
}
