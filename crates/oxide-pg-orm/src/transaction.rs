//! The transaction collaborator the repository runs its commands through.

use oxide_pg_core::{SqlCommand, SqlValue};
use serde::Serialize;

use crate::error::BackendError;
use crate::key::{EntityKey, TableId};

/// A row returned by a query, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRow {
    columns: Vec<(String, SqlValue)>,
}

impl QueryRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Value of the column named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Value at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Integer value at `index`.
    #[must_use]
    pub fn int_at(&self, index: usize) -> Option<i64> {
        match self.at(index) {
            Some(SqlValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A change made through the repository, kept in the transaction's log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionalChange {
    /// Rows inserted by one insert call.
    EntitiesCreated {
        /// Identities of the inserted entities, junction rows excluded.
        #[serde(serialize_with = "serialize_keys")]
        entities: Vec<EntityKey>,
        /// Version stamped on new entities.
        version: i64,
    },
    /// Rows of one prior version changed by an update.
    EntitiesUpdated {
        #[serde(serialize_with = "serialize_table")]
        table: TableId,
        /// Version the rows had before the update.
        version: i64,
        /// Number of rows that had that version.
        rows: u64,
        /// Version stamped by the update.
        new_version: i64,
        /// The update command.
        command: String,
    },
    /// Rows of one prior version removed by a delete.
    EntitiesDeleted {
        #[serde(serialize_with = "serialize_table")]
        table: TableId,
        version: i64,
        rows: u64,
        command: String,
    },
}

fn serialize_keys<S: serde::Serializer>(
    keys: &[EntityKey],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(keys.iter().map(ToString::to_string))
}

fn serialize_table<S: serde::Serializer>(
    table: &TableId,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(table.as_str())
}

/// A database transaction.
///
/// Commands carry `@pN` placeholders; implementations map them to whatever
/// their backend expects. Statements run in call order, one at a time.
#[allow(async_fn_in_trait)]
pub trait DatabaseTransaction: Send {
    /// Executes a command and returns the number of affected rows.
    async fn execute(&mut self, command: &SqlCommand) -> Result<u64, BackendError>;

    /// Runs a query and returns its rows.
    async fn query(&mut self, command: &SqlCommand) -> Result<Vec<QueryRow>, BackendError>;

    /// Identifier of the current transaction, monotonic across transactions.
    async fn transaction_id(&mut self) -> Result<i64, BackendError>;

    /// Appends a change to the log.
    fn record(&mut self, change: TransactionalChange);

    /// Changes recorded so far.
    fn changes(&self) -> &[TransactionalChange];
}
