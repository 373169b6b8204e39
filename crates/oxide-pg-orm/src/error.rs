//! Error types for the repository.

use oxide_pg_core::{SqlCommand, TranslationError};
use thiserror::Error;

/// SQLSTATE reported for serialization failures.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE reported for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// An error reported by the database backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    /// SQLSTATE code, when the backend reported one.
    pub code: Option<String>,
    /// Backend message.
    pub message: String,
}

impl BackendError {
    /// Creates an error without a SQLSTATE code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error carrying a SQLSTATE code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Returns true for serialization failures and unique violations.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(SERIALIZATION_FAILURE | UNIQUE_VIOLATION)
        )
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(database) => Self {
                code: database.code().map(|code| code.into_owned()),
                message: database.message().to_string(),
            },
            _ => Self::new(error.to_string()),
        }
    }
}

/// Repository errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// A query, predicate or value expression could not be compiled.
    #[error("translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Another transaction changed the same rows first.
    #[error("concurrent update while executing `{command}`: {source}")]
    ConcurrentUpdate {
        /// Text of the failing command.
        command: String,
        /// Backend error.
        source: BackendError,
    },

    /// The backend rejected a command.
    #[error("failed to execute `{command}`: {source}")]
    Execution {
        /// Text of the failing command.
        command: String,
        /// Backend error.
        source: BackendError,
    },

    /// A statement outside any single command failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// An insert template ended up with no columns.
    #[error("table {0} has no columns to insert")]
    NoColumns(String),

    /// An update targets a collection relation.
    #[error("column {column} of {entity} is a collection and cannot be assigned")]
    CollectionUpdate {
        /// Entity name.
        entity: String,
        /// Collection column.
        column: String,
    },

    /// The entity type has no optimistic-concurrency version column.
    #[error("entity {0} has no version column")]
    MissingVersion(String),

    /// The entity type has no primary key column.
    #[error("entity {0} has no primary key")]
    MissingKey(String),

    /// Required relations form a cycle.
    #[error("required relations form a cycle between {0}")]
    OrderingCycle(String),
}

impl OrmError {
    /// Classifies a backend failure of `command`.
    #[must_use]
    pub fn classify(command: &SqlCommand, error: BackendError) -> Self {
        let command = command.text.clone();
        if error.is_conflict() {
            Self::ConcurrentUpdate {
                command,
                source: error,
            }
        } else {
            Self::Execution {
                command,
                source: error,
            }
        }
    }

    /// Returns true for [`OrmError::ConcurrentUpdate`].
    #[must_use]
    pub const fn is_concurrent_update(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate { .. })
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, OrmError>;
