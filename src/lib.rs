//! # SqlCloak
//!
//! Transparent SQL column encryption between an application and its
//! relational database. Callers keep issuing ordinary SQL with plaintext
//! literals and parameters against an [`EncryptDataSource`]; the layer
//! rewrites statements to operate on ciphertext, executes them through a
//! pluggable backend, and decrypts result values lazily on read.
//!
//! ## Core Components
//!
//! * `config` - Rule configuration: named encryptors and column bindings
//! * `rule` - The compiled, validated, immutable rule set
//! * `encryptor` - Value codecs: AES-256-GCM strategies (randomized,
//!   deterministic, and assisted) plus the strategy registry
//! * `rewrite` - Statement analysis and rewriting of values and predicates
//! * `result` - Lazy result decryption and assist-column filtering
//! * `datasource` - The datasource/connection façade
//! * `backend` - The collaborator contract for the real database
//! * `error` - Error types and handling
//!
//! ## Searchable encryption
//!
//! Columns encrypted with a randomized strategy are not directly
//! searchable. Bindings may configure an assist encryptor: inserts then
//! also store a deterministically derived assist value in a companion
//! column, and equality predicates on the column are rewritten to exact
//! comparisons against that companion. Assist columns stay invisible to
//! callers unless selected by name.

pub mod backend;
pub mod config;
pub mod datasource;
pub mod encryptor;
pub mod error;
pub mod result;
pub mod rewrite;
pub mod rule;
pub mod value;

// Re-export main types for convenience
pub use backend::{Backend, BackendConnection, BackendRows};
pub use config::{ColumnBinding, EncryptRuleConfig, EncryptorConfig};
pub use datasource::{EncryptConnection, EncryptDataSource, EncryptOptions};
pub use encryptor::error::{CryptoError, CryptoResult};
pub use encryptor::{AssistedEncryptor, Encryptor, EncryptorRegistry};
pub use error::{BackendError, CloakError, CloakResult};
pub use result::{DecryptingRows, Row};
pub use rewrite::{RewriteResult, StatementRewriter};
pub use rule::EncryptRule;
pub use value::SqlValue;
