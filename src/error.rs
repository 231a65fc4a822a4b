//! Unified error handling for the encryption layer
//!
//! Four error classes reach callers: configuration problems (fatal to the
//! datasource), predicates that cannot be evaluated safely, cryptographic
//! failures, and errors delegated from the underlying database. Delegated
//! errors are passed through transparently so callers keep the original
//! failure semantics of the backend.

use crate::encryptor::error::CryptoError;
use thiserror::Error;

/// Boxed error type produced by backend collaborators
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for operations on the encryption layer
pub type CloakResult<T> = Result<T, CloakError>;

/// Errors surfaced by the encryption layer
#[derive(Error, Debug)]
pub enum CloakError {
    /// Malformed or inconsistent rule/encryptor setup
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A WHERE predicate on an encrypted column cannot be evaluated safely
    #[error("Unsupported predicate: {message}")]
    UnsupportedPredicate { message: String },

    /// Encode/decode/derive failure from a value codec
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Error delegated from the underlying connection, unchanged
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// Operation attempted on a connection that was already closed
    #[error("Connection is closed")]
    ConnectionClosed,
}

impl CloakError {
    /// Configuration error from any displayable cause
    pub fn configuration(message: impl Into<String>) -> Self {
        CloakError::Configuration {
            message: message.into(),
        }
    }

    /// Unsupported-predicate error from any displayable cause
    pub fn unsupported_predicate(message: impl Into<String>) -> Self {
        CloakError::UnsupportedPredicate {
            message: message.into(),
        }
    }
}
