//! Error types for cryptographic operations

use thiserror::Error;

/// Result type alias for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during encrypt/decrypt/derive operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Invalid key material provided
    #[error("Invalid key material: {message}")]
    InvalidKey { message: String },

    /// Error during key derivation
    #[error("Key derivation failed: {message}")]
    KeyDerivation { message: String },

    /// Encryption failure
    #[error("Encryption failed: {message}")]
    Encryption { message: String },

    /// Decryption or authentication failure
    #[error("Decryption failed: {message}")]
    Decryption { message: String },

    /// Stored value is not in the expected ciphertext format
    #[error("Malformed ciphertext: {message}")]
    MalformedCiphertext { message: String },

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
