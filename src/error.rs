//! Error types for the ledger.

use std::path::PathBuf;

/// Failures raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema mismatch in '{table}': expected column '{column}' is missing")]
    SchemaMismatch { table: String, column: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Business-rule and lookup failures surfaced to the operator.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("Device '{0}' already exists in the catalog")]
    DuplicateProduct(String),

    #[error("Customer '{0}' already exists")]
    DuplicateCustomer(String),

    #[error("Invoice '{0}' is already fully paid")]
    InvoiceSettled(String),

    #[error("User '{0}' already exists")]
    DuplicateUser(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Amount out of range while computing {0}")]
    AmountOutOfRange(&'static str),

    #[error("Failed to render document: {0}")]
    Render(String),
}

impl LedgerError {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}
