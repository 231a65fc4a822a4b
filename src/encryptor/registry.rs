//! Name-to-strategy registry built once from the rule configuration

use crate::config::EncryptorConfig;
use crate::encryptor::{build_encryptor, AssistedEncryptor, Encryptor};
use crate::error::{CloakError, CloakResult};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered strategy, tagged by capability variant
#[derive(Clone)]
pub enum RegisteredEncryptor {
    /// Encrypt/decrypt only
    Plain(Arc<dyn Encryptor>),
    /// Encrypt/decrypt plus assist derivation
    Assisted(Arc<dyn AssistedEncryptor>),
}

impl RegisteredEncryptor {
    /// The common encrypt/decrypt surface of either variant
    pub fn encryptor(&self) -> &dyn Encryptor {
        match self {
            RegisteredEncryptor::Plain(e) => e.as_ref(),
            RegisteredEncryptor::Assisted(e) => e.as_ref(),
        }
    }

    /// The assisted surface, if this strategy has one
    pub fn assisted(&self) -> Option<&dyn AssistedEncryptor> {
        match self {
            RegisteredEncryptor::Plain(_) => None,
            RegisteredEncryptor::Assisted(e) => Some(e.as_ref()),
        }
    }

    /// Whether equal plaintexts always produce equal ciphertexts
    pub fn is_deterministic(&self) -> bool {
        self.encryptor().is_deterministic()
    }
}

impl std::fmt::Debug for RegisteredEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisteredEncryptor::Plain(e) => {
                write!(f, "Plain({})", e.algorithm())
            }
            RegisteredEncryptor::Assisted(e) => {
                write!(f, "Assisted({})", e.algorithm())
            }
        }
    }
}

/// Immutable mapping from encryptor name to strategy instance
///
/// Built once at datasource construction; every construction problem
/// (duplicate name, unknown algorithm, bad key material) is a
/// configuration error, leaving no partially usable registry.
#[derive(Debug)]
pub struct EncryptorRegistry {
    encryptors: HashMap<String, RegisteredEncryptor>,
}

impl EncryptorRegistry {
    /// Build the registry from encryptor configurations
    pub fn from_configs(configs: &[EncryptorConfig]) -> CloakResult<Self> {
        let mut encryptors = HashMap::with_capacity(configs.len());
        for config in configs {
            let strategy = build_encryptor(config).map_err(|e| CloakError::Configuration {
                message: format!("encryptor '{}': {}", config.name, e),
            })?;
            if encryptors.insert(config.name.clone(), strategy).is_some() {
                return Err(CloakError::Configuration {
                    message: format!("duplicate encryptor name: '{}'", config.name),
                });
            }
        }
        Ok(Self { encryptors })
    }

    /// Look up a strategy by name
    pub fn get(&self, name: &str) -> Option<&RegisteredEncryptor> {
        self.encryptors.get(name)
    }

    /// Look up a strategy by name, failing on unregistered names
    pub fn resolve(&self, name: &str) -> CloakResult<&RegisteredEncryptor> {
        self.get(name).ok_or_else(|| CloakError::Configuration {
            message: format!("unregistered encryptor name: '{}'", name),
        })
    }

    /// Number of registered strategies
    pub fn len(&self) -> usize {
        self.encryptors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.encryptors.is_empty()
    }
}
