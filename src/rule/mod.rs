//! Compiled encryption rule: the immutable runtime form of the configuration
//!
//! [`EncryptRule::new`] validates the whole configuration once — unknown
//! encryptor names, half-specified assist bindings, duplicate (table,
//! column) keys, assist-column collisions — and compiles it into exact-key
//! maps. After construction the rule is immutable and shared read-only
//! (`Arc`) with every connection the datasource produces; there is no
//! mutation API.

use crate::config::{ColumnBinding, EncryptRuleConfig};
use crate::encryptor::registry::{EncryptorRegistry, RegisteredEncryptor};
use crate::encryptor::AssistedEncryptor;
use crate::error::{CloakError, CloakResult};
use std::collections::{HashMap, HashSet};

/// Normalized lookup key for a logical identifier
///
/// SQL identifiers compare case-insensitively here, matching the common
/// behavior of unquoted identifiers.
fn normalize(identifier: &str) -> String {
    identifier.to_ascii_lowercase()
}

/// Validated, immutable column-encryption rule set
#[derive(Debug)]
pub struct EncryptRule {
    registry: EncryptorRegistry,
    bindings: HashMap<(String, String), ColumnBinding>,
    assist_columns: HashMap<String, HashSet<String>>,
}

impl EncryptRule {
    /// Compile and validate a rule configuration
    pub fn new(config: EncryptRuleConfig) -> CloakResult<Self> {
        let registry = EncryptorRegistry::from_configs(&config.encryptors)?;

        let mut bindings: HashMap<(String, String), ColumnBinding> = HashMap::new();
        let mut bound_columns: HashMap<String, HashSet<String>> = HashMap::new();
        let mut assist_columns: HashMap<String, HashSet<String>> = HashMap::new();

        for binding in &config.bindings {
            if binding.table.is_empty() || binding.column.is_empty() {
                return Err(CloakError::configuration(
                    "binding table and column names must be non-empty",
                ));
            }

            let table = normalize(&binding.table);
            let column = normalize(&binding.column);

            registry.resolve(&binding.encryptor).map_err(|_| {
                CloakError::Configuration {
                    message: format!(
                        "binding {}.{} references unregistered encryptor '{}'",
                        binding.table, binding.column, binding.encryptor
                    ),
                }
            })?;

            match (&binding.assist_encryptor, &binding.assist_column) {
                (None, None) => {}
                (Some(assist_name), Some(assist_column)) => {
                    let strategy = registry.resolve(assist_name).map_err(|_| {
                        CloakError::Configuration {
                            message: format!(
                                "binding {}.{} references unregistered assist encryptor '{}'",
                                binding.table, binding.column, assist_name
                            ),
                        }
                    })?;
                    if strategy.assisted().is_none() {
                        return Err(CloakError::Configuration {
                            message: format!(
                                "assist encryptor '{}' for {}.{} does not support assist derivation",
                                assist_name, binding.table, binding.column
                            ),
                        });
                    }
                    let assist_column = normalize(assist_column);
                    if assist_column == column {
                        return Err(CloakError::Configuration {
                            message: format!(
                                "assist column of {}.{} collides with the cipher column itself",
                                binding.table, binding.column
                            ),
                        });
                    }
                    if !assist_columns
                        .entry(table.clone())
                        .or_default()
                        .insert(assist_column.clone())
                    {
                        return Err(CloakError::Configuration {
                            message: format!(
                                "assist column '{}' is used by more than one binding in table '{}'",
                                assist_column, binding.table
                            ),
                        });
                    }
                }
                _ => {
                    return Err(CloakError::Configuration {
                        message: format!(
                            "binding {}.{} must set assist encryptor and assist column together",
                            binding.table, binding.column
                        ),
                    });
                }
            }

            bound_columns
                .entry(table.clone())
                .or_default()
                .insert(column.clone());

            if bindings
                .insert((table, column), binding.clone())
                .is_some()
            {
                return Err(CloakError::Configuration {
                    message: format!(
                        "duplicate binding for {}.{}",
                        binding.table, binding.column
                    ),
                });
            }
        }

        // Assist columns must not collide with any bound column of the
        // same table, regardless of binding order.
        for (table, assists) in &assist_columns {
            if let Some(bound) = bound_columns.get(table) {
                if let Some(collision) = assists.intersection(bound).next() {
                    return Err(CloakError::Configuration {
                        message: format!(
                            "assist column '{}' collides with a bound column in table '{}'",
                            collision, table
                        ),
                    });
                }
            }
        }

        Ok(Self {
            registry,
            bindings,
            assist_columns,
        })
    }

    /// Look up the binding for a (table, column) pair
    pub fn resolve(&self, table: &str, column: &str) -> Option<&ColumnBinding> {
        self.bindings.get(&(normalize(table), normalize(column)))
    }

    /// Whether any column of the table is bound
    pub fn table_has_bindings(&self, table: &str) -> bool {
        let table = normalize(table);
        self.bindings.keys().any(|(t, _)| *t == table)
    }

    /// Normalized names of the bound columns of a table
    pub fn bound_columns(&self, table: &str) -> impl Iterator<Item = &str> {
        let table = normalize(table);
        self.bindings
            .keys()
            .filter(move |(t, _)| *t == table)
            .map(|(_, c)| c.as_str())
    }

    /// Normalized names of the distinct tables that have bindings
    pub fn bound_tables(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.bindings
            .keys()
            .filter_map(move |(t, _)| seen.insert(t.as_str()).then(|| t.as_str()))
    }

    /// Whether the column is the assist column of some binding in the table
    pub fn is_assist_column(&self, table: &str, column: &str) -> bool {
        self.assist_columns
            .get(&normalize(table))
            .map(|set| set.contains(&normalize(column)))
            .unwrap_or(false)
    }

    /// The primary strategy of a binding
    pub fn encryptor_for(&self, binding: &ColumnBinding) -> CloakResult<&RegisteredEncryptor> {
        self.registry.resolve(&binding.encryptor)
    }

    /// The assist strategy of a binding, if one is configured
    pub fn assisted_for(
        &self,
        binding: &ColumnBinding,
    ) -> CloakResult<Option<&dyn AssistedEncryptor>> {
        match &binding.assist_encryptor {
            None => Ok(None),
            Some(name) => {
                let strategy = self.registry.resolve(name)?;
                // Validated at construction; a Plain variant here means the
                // rule was built through a path that skipped validation.
                strategy.assisted().map(Some).ok_or_else(|| {
                    CloakError::Configuration {
                        message: format!("encryptor '{}' has no assist capability", name),
                    }
                })
            }
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &EncryptorRegistry {
        &self.registry
    }
}
