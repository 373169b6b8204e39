//! Postgres transactions through sqlx.

use core::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use oxide_pg_core::{SqlCommand, SqlValue};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, Transaction};
use tracing::{debug, trace};

use crate::error::BackendError;
use crate::transaction::{DatabaseTransaction, QueryRow, TransactionalChange};

/// A live Postgres transaction.
///
/// Dropping it without calling [`commit`](Self::commit) rolls it back.
pub struct PgTransaction {
    inner: Transaction<'static, Postgres>,
    transaction_id: Option<i64>,
    changes: Vec<TransactionalChange>,
}

impl fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgTransaction")
            .field("transaction_id", &self.transaction_id)
            .field("changes", &self.changes.len())
            .finish_non_exhaustive()
    }
}

impl PgTransaction {
    /// Begins a transaction on a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection could be acquired.
    pub async fn begin(pool: &PgPool) -> Result<Self, BackendError> {
        let inner = pool.begin().await?;
        Ok(Self {
            inner,
            transaction_id: None,
            changes: Vec::new(),
        })
    }

    /// Commits and returns the recorded change log.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<Vec<TransactionalChange>, BackendError> {
        self.inner.commit().await?;
        debug!(changes = self.changes.len(), "committed transaction");
        Ok(self.changes)
    }

    /// Rolls back, discarding the change log.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), BackendError> {
        self.inner.rollback().await?;
        debug!("rolled back transaction");
        Ok(())
    }
}

impl DatabaseTransaction for PgTransaction {
    async fn execute(&mut self, command: &SqlCommand) -> Result<u64, BackendError> {
        let (text, values) = to_positional(command);
        trace!(sql = %text, "execute");
        let query = bind_all(sqlx::query(&text), values);
        let result = query.execute(&mut *self.inner).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, command: &SqlCommand) -> Result<Vec<QueryRow>, BackendError> {
        let (text, values) = to_positional(command);
        trace!(sql = %text, "query");
        let query = bind_all(sqlx::query(&text), values);
        let rows = query.fetch_all(&mut *self.inner).await?;
        Ok(rows.iter().map(convert_row).collect())
    }

    async fn transaction_id(&mut self) -> Result<i64, BackendError> {
        if let Some(id) = self.transaction_id {
            return Ok(id);
        }
        let id: i64 = sqlx::query_scalar("select txid_current()")
            .fetch_one(&mut *self.inner)
            .await?;
        self.transaction_id = Some(id);
        Ok(id)
    }

    fn record(&mut self, change: TransactionalChange) {
        self.changes.push(change);
    }

    fn changes(&self) -> &[TransactionalChange] {
        &self.changes
    }
}

/// Rewrites `@pN` placeholders to Postgres `$k` placeholders.
///
/// NULL parameters are written inline: an untyped NULL bound through the
/// driver carries a concrete type that may not match the target column.
/// A placeholder used twice maps to the same `$k`.
pub fn to_positional(command: &SqlCommand) -> (String, Vec<SqlValue>) {
    let text = &command.text;
    let mut out = String::with_capacity(text.len());
    let mut values = Vec::new();
    let mut slots: Vec<Option<usize>> = vec![None; command.parameters.len()];
    let mut rest = text.as_str();

    while let Some(at) = rest.find("@p") {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 2..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        let index = tail[..digits].parse::<usize>().ok();
        match index.and_then(|i| command.parameters.get(i).map(|p| (i, &p.value))) {
            Some((_, SqlValue::Null)) => out.push_str("null"),
            Some((i, value)) => {
                let slot = *slots[i].get_or_insert_with(|| {
                    values.push(value.clone());
                    values.len()
                });
                out.push('$');
                out.push_str(&slot.to_string());
            }
            None => out.push_str(&rest[at..at + 2 + digits]),
        }
        rest = &tail[digits..];
    }
    out.push_str(rest);
    (out, values)
}

fn bind_all(
    mut query: Query<'_, Postgres, PgArguments>,
    values: Vec<SqlValue>,
) -> Query<'_, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::TimestampTz(v) => query.bind(v),
        };
    }
    query
}

fn convert_row(row: &PgRow) -> QueryRow {
    let mut out = QueryRow::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Int)
        } else if let Ok(v) = row.try_get::<Option<i32>, _>(i) {
            v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into()))
        } else if let Ok(v) = row.try_get::<Option<i16>, _>(i) {
            v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into()))
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Bool)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Float)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Text)
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Bytes)
        } else if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Date)
        } else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::Timestamp)
        } else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(i) {
            v.map_or(SqlValue::Null, SqlValue::TimestampTz)
        } else if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(i) {
            // Enum labels and other textual types without a checked decoder.
            v.map_or(SqlValue::Null, SqlValue::Text)
        } else {
            SqlValue::Null
        };
        out = out.with(column.name(), value);
    }
    out
}
