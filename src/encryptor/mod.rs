//! Value codecs: pluggable encryption strategies for column values
//!
//! Two capability variants exist. A plain [`Encryptor`] encodes and decodes
//! column values; an [`AssistedEncryptor`] additionally derives a
//! deterministic assist value from plaintext, enabling equality search over
//! columns whose primary encryption is randomized.
//!
//! Strategies are constructed from an algorithm id and free-form string
//! properties. Key material is supplied either as a hex-encoded 256-bit
//! `key` property or derived from a `passphrase` property with BLAKE3 under
//! a domain-separation prefix.

pub mod aes_gcm;
pub mod assisted;
pub mod deterministic;
pub mod error;
pub mod registry;

use crate::config::EncryptorConfig;
use crate::value::SqlValue;
use error::{CryptoError, CryptoResult};
use std::collections::BTreeMap;
use zeroize::ZeroizeOnDrop;

pub use registry::{EncryptorRegistry, RegisteredEncryptor};

/// Size of an AES-256 key in bytes
pub const AES_KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce in bytes
pub const AES_NONCE_SIZE: usize = 12;

/// Domain-separation prefix for passphrase key derivation
const KEY_DERIVATION_CONTEXT: &[u8] = b"sqlcloak_column_key_v1:";

/// A value encryption strategy
///
/// The round-trip law `decrypt(encrypt(v)) == v` must hold for every value
/// in the supported domain. `Null` is never passed to a strategy; the
/// rewrite and result layers pass it through unchanged.
pub trait Encryptor: Send + Sync {
    /// Algorithm identifier this strategy was built from
    fn algorithm(&self) -> &str;

    /// Whether equal plaintexts always produce equal ciphertexts
    fn is_deterministic(&self) -> bool;

    /// Encode a plaintext value to its stored ciphertext form
    fn encrypt(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue>;

    /// Decode a stored ciphertext back to the original plaintext
    fn decrypt(&self, ciphertext: &SqlValue) -> CryptoResult<SqlValue>;
}

/// An encryption strategy that also derives a searchable assist value
///
/// `derive_assist` must be a pure function of the plaintext even when
/// `encrypt` is randomized, and `encode_assist` must be deterministic:
/// equality search compares stored assist values, not ciphertexts, so the
/// full `encode_assist(derive_assist(v))` pipeline has to map equal
/// plaintexts to equal stored values.
pub trait AssistedEncryptor: Encryptor {
    /// Derive the deterministic assist representation of a plaintext value
    fn derive_assist(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue>;

    /// Encode a derived assist value into its stored form
    fn encode_assist(&self, assist: &SqlValue) -> CryptoResult<SqlValue>;

    /// The stored (and query) form of the assist slot for a plaintext value
    fn assist_value(&self, plaintext: &SqlValue) -> CryptoResult<SqlValue> {
        let derived = self.derive_assist(plaintext)?;
        self.encode_assist(&derived)
    }
}

/// AES-256 key material with automatic zeroization
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; AES_KEY_SIZE],
}

impl EncryptionKey {
    /// Create a key from raw bytes
    pub fn new(key_bytes: [u8; AES_KEY_SIZE]) -> Self {
        Self { key: key_bytes }
    }

    /// Resolve key material from strategy properties
    ///
    /// Accepts either `key` (hex-encoded 32 bytes) or `passphrase`
    /// (BLAKE3-derived under [`KEY_DERIVATION_CONTEXT`]).
    pub fn from_properties(properties: &BTreeMap<String, String>) -> CryptoResult<Self> {
        if let Some(hex_key) = properties.get("key") {
            let raw = hex::decode(hex_key).map_err(|e| CryptoError::InvalidKey {
                message: format!("key property is not valid hex: {}", e),
            })?;
            if raw.len() != AES_KEY_SIZE {
                return Err(CryptoError::InvalidKey {
                    message: format!(
                        "key property must decode to {} bytes, got {}",
                        AES_KEY_SIZE,
                        raw.len()
                    ),
                });
            }
            let mut key = [0u8; AES_KEY_SIZE];
            key.copy_from_slice(&raw);
            return Ok(Self::new(key));
        }

        if let Some(passphrase) = properties.get("passphrase") {
            if passphrase.is_empty() {
                return Err(CryptoError::KeyDerivation {
                    message: "passphrase property is empty".to_string(),
                });
            }
            let mut hasher = blake3::Hasher::new();
            hasher.update(KEY_DERIVATION_CONTEXT);
            hasher.update(passphrase.as_bytes());
            let mut key = [0u8; AES_KEY_SIZE];
            key.copy_from_slice(&hasher.finalize().as_bytes()[..AES_KEY_SIZE]);
            return Ok(Self::new(key));
        }

        Err(CryptoError::InvalidKey {
            message: "encryptor properties must contain either 'key' or 'passphrase'".to_string(),
        })
    }

    /// The raw key bytes
    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Construct a strategy from its configuration
///
/// Unknown algorithm ids and bad key material fail here; the registry maps
/// those failures to configuration errors at datasource construction.
pub fn build_encryptor(config: &EncryptorConfig) -> CryptoResult<RegisteredEncryptor> {
    use std::sync::Arc;

    let key = EncryptionKey::from_properties(&config.properties)?;
    match config.algorithm.as_str() {
        aes_gcm::ALGORITHM_AES_256_GCM => Ok(RegisteredEncryptor::Plain(Arc::new(
            aes_gcm::AesGcmEncryptor::new(key),
        ))),
        deterministic::ALGORITHM_DETERMINISTIC_AES_256_GCM => Ok(RegisteredEncryptor::Plain(
            Arc::new(deterministic::DeterministicAesEncryptor::new(key)),
        )),
        assisted::ALGORITHM_ASSISTED_AES_256_GCM => Ok(RegisteredEncryptor::Assisted(Arc::new(
            assisted::AssistedAesEncryptor::new(key),
        ))),
        other => Err(CryptoError::InvalidInput(format!(
            "unknown encryption algorithm: {}",
            other
        ))),
    }
}
