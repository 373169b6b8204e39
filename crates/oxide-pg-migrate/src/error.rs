//! Error types for schema reconciliation.

use oxide_pg_core::SchemaError;
use oxide_pg_orm::OrmError;

/// Errors that can occur while extracting or applying schema changes.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The snapshots could not be compared or the changes not ordered.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A statement or history write failed.
    #[error("Database error: {0}")]
    Orm(#[from] OrmError),

    /// The introspector could not describe the live database.
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// A history row could not be read back.
    #[error("Invalid migration history row: {0}")]
    InvalidHistory(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
