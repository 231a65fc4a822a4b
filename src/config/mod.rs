//! Rule configuration supplied by the caller at datasource construction
//!
//! The configuration is a plain serde-friendly description: a list of named
//! encryptors (algorithm id plus free-form string properties) and a list of
//! column bindings. It carries no validation logic of its own; the compiled
//! [`EncryptRule`](crate::rule::EncryptRule) validates everything once and
//! becomes the immutable runtime form.

use crate::error::{CloakError, CloakResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named encryptor: algorithm id plus construction properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptorConfig {
    /// Unique name the bindings refer to
    pub name: String,
    /// Algorithm identifier, e.g. `aes-256-gcm`
    pub algorithm: String,
    /// Free-form construction properties (`key`, `passphrase`, ...)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl EncryptorConfig {
    /// Create a config with no properties
    pub fn new(name: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: algorithm.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Add a construction property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Binding of a logical (table, column) pair to an encryptor
///
/// An assist encryptor and assist column are either both present or both
/// absent; the compiled rule rejects half-specified bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnBinding {
    /// Logical table name
    pub table: String,
    /// Logical column name holding the ciphertext
    pub column: String,
    /// Name of the primary encryptor
    pub encryptor: String,
    /// Name of the assist encryptor, for searchable columns
    #[serde(default)]
    pub assist_encryptor: Option<String>,
    /// Name of the column storing the derived assist value
    #[serde(default)]
    pub assist_column: Option<String>,
}

impl ColumnBinding {
    /// Binding with no assist column
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        encryptor: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            encryptor: encryptor.into(),
            assist_encryptor: None,
            assist_column: None,
        }
    }

    /// Attach an assist encryptor and the column its derived values live in
    pub fn with_assist(
        mut self,
        assist_encryptor: impl Into<String>,
        assist_column: impl Into<String>,
    ) -> Self {
        self.assist_encryptor = Some(assist_encryptor.into());
        self.assist_column = Some(assist_column.into());
        self
    }
}

/// The full rule configuration: encryptors plus column bindings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptRuleConfig {
    /// Registered encryptors
    #[serde(default)]
    pub encryptors: Vec<EncryptorConfig>,
    /// Column bindings
    #[serde(default)]
    pub bindings: Vec<ColumnBinding>,
}

impl EncryptRuleConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encryptor
    pub fn with_encryptor(mut self, encryptor: EncryptorConfig) -> Self {
        self.encryptors.push(encryptor);
        self
    }

    /// Add a column binding
    pub fn with_binding(mut self, binding: ColumnBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Load from a TOML document
    pub fn from_toml_str(input: &str) -> CloakResult<Self> {
        toml::from_str(input).map_err(|e| CloakError::Configuration {
            message: format!("invalid rule configuration (TOML): {}", e),
        })
    }

    /// Load from a JSON document
    pub fn from_json_str(input: &str) -> CloakResult<Self> {
        serde_json::from_str(input).map_err(|e| CloakError::Configuration {
            message: format!("invalid rule configuration (JSON): {}", e),
        })
    }
}
