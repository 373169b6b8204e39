//! Error types.

use thiserror::Error;

/// Failure while building the IR of a query or rendering it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    /// The query uses a shape with no IR counterpart.
    #[error("unsupported query shape: {0}")]
    Unsupported(String),

    /// A node was handed a child kind it never accepts. This is a bug in
    /// whatever drives the builder, not a property of the query.
    #[error("{parent} does not accept {child} in its current state")]
    InvalidApply {
        /// Receiving node kind.
        parent: &'static str,
        /// Rejected child kind.
        child: &'static str,
    },

    /// A node was used before all its required slots were filled.
    #[error("{0} is incomplete")]
    Incomplete(&'static str),

    /// A member access names nothing on its owner type.
    #[error("unknown member `{member}` on {owner}")]
    UnknownMember {
        /// Owner type.
        owner: String,
        /// Requested member.
        member: String,
    },

    /// An update accessor does not resolve to exactly one column.
    #[error("expected a single column accessor, got {0}")]
    InvalidAccessor(String),
}

/// Failure while comparing or ordering schema snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Neither side of the comparison exists.
    #[error("wrong database change: both actual and expected databases are absent")]
    WrongDatabaseChange,

    /// The expected model has no database but one exists.
    #[error("refusing to drop database {0}")]
    ImplicitDatabaseDrop(String),

    /// The two snapshots describe different databases.
    #[error("can't apply changes from {actual} to {expected}")]
    DatabaseMismatch {
        /// Identity of the live database.
        actual: String,
        /// Identity of the expected database.
        expected: String,
    },

    /// A schema exists that the model does not know.
    #[error("refusing to drop schema {0}")]
    ImplicitSchemaDrop(String),

    /// A table exists that the model does not know.
    #[error("refusing to drop table {schema}.{table}")]
    ImplicitTableDrop {
        /// Schema name.
        schema: String,
        /// Table name.
        table: String,
    },

    /// Changes depend on each other in a loop.
    #[error("model changes form a dependency cycle: {0}")]
    DependencyCycle(String),

    /// An entity type cannot be mapped to a table.
    #[error("entity {entity} is invalid: {reason}")]
    InvalidEntity {
        /// Entity name.
        entity: String,
        /// Why it is rejected.
        reason: String,
    },
}

/// Result alias for IR and translation.
pub type Result<T> = std::result::Result<T, TranslationError>;
