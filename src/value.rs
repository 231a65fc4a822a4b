//! Scalar value model shared by callers, codecs, and backends
//!
//! [`SqlValue`] is the value domain moved across the layer: plaintext on the
//! caller side, ciphertext/assist values on the backend side. Plaintext
//! scalars are canonically serialized to a tag-byte framed binary form
//! before encryption so that decryption can restore the original variant
//! exactly.

use crate::encryptor::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag byte identifying a NULL payload
const TAG_NULL: u8 = b'n';
/// Tag byte identifying an integer payload
const TAG_INTEGER: u8 = b'i';
/// Tag byte identifying a real payload
const TAG_REAL: u8 = b'r';
/// Tag byte identifying a text payload
const TAG_TEXT: u8 = b't';
/// Tag byte identifying a bytes payload
const TAG_BYTES: u8 = b'b';

/// A SQL scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Signed 64-bit integer
    Integer(i64),
    /// Double-precision float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Whether this value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Serialize to the canonical tag-byte binary form used as codec input
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        match self {
            SqlValue::Null => vec![TAG_NULL],
            SqlValue::Integer(v) => {
                let mut out = Vec::with_capacity(9);
                out.push(TAG_INTEGER);
                out.extend_from_slice(&v.to_be_bytes());
                out
            }
            SqlValue::Real(v) => {
                let mut out = Vec::with_capacity(9);
                out.push(TAG_REAL);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
                out
            }
            SqlValue::Text(s) => {
                let mut out = Vec::with_capacity(1 + s.len());
                out.push(TAG_TEXT);
                out.extend_from_slice(s.as_bytes());
                out
            }
            SqlValue::Bytes(b) => {
                let mut out = Vec::with_capacity(1 + b.len());
                out.push(TAG_BYTES);
                out.extend_from_slice(b);
                out
            }
        }
    }

    /// Restore a value from its canonical tag-byte binary form
    pub fn from_canonical_bytes(data: &[u8]) -> CryptoResult<Self> {
        let (tag, payload) = data
            .split_first()
            .ok_or_else(|| CryptoError::InvalidInput("empty canonical value".to_string()))?;
        match *tag {
            TAG_NULL => Ok(SqlValue::Null),
            TAG_INTEGER => {
                let raw: [u8; 8] = payload.try_into().map_err(|_| {
                    CryptoError::InvalidInput(format!(
                        "integer payload must be 8 bytes, got {}",
                        payload.len()
                    ))
                })?;
                Ok(SqlValue::Integer(i64::from_be_bytes(raw)))
            }
            TAG_REAL => {
                let raw: [u8; 8] = payload.try_into().map_err(|_| {
                    CryptoError::InvalidInput(format!(
                        "real payload must be 8 bytes, got {}",
                        payload.len()
                    ))
                })?;
                Ok(SqlValue::Real(f64::from_bits(u64::from_be_bytes(raw))))
            }
            TAG_TEXT => {
                let text = String::from_utf8(payload.to_vec()).map_err(|e| {
                    CryptoError::InvalidInput(format!("text payload is not UTF-8: {}", e))
                })?;
                Ok(SqlValue::Text(text))
            }
            TAG_BYTES => Ok(SqlValue::Bytes(payload.to_vec())),
            other => Err(CryptoError::InvalidInput(format!(
                "unknown value tag: 0x{:02x}",
                other
            ))),
        }
    }

    /// Render this value as a SQL literal
    ///
    /// Single quotes in text are doubled; bytes render as a hex literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(v) => v.to_string(),
            SqlValue::Real(v) => v.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Bytes(b) => format!("x'{}'", hex::encode(b)),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Real(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Bytes(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(b: Vec<u8>) -> Self {
        SqlValue::Bytes(b)
    }
}
