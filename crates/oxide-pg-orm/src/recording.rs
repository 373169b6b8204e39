//! An in-memory [`DatabaseTransaction`] that records commands.
//!
//! Useful for dry runs and for tests: queries answer from scripted results
//! and executes report scripted row counts.

use std::collections::VecDeque;

use oxide_pg_core::SqlCommand;

use crate::error::BackendError;
use crate::transaction::{DatabaseTransaction, QueryRow, TransactionalChange};

/// Records every command it is given.
#[derive(Debug, Default)]
pub struct RecordingTransaction {
    commands: Vec<SqlCommand>,
    results: VecDeque<Vec<QueryRow>>,
    affected: VecDeque<u64>,
    default_affected: u64,
    failure: Option<BackendError>,
    transaction_id: i64,
    id_requests: usize,
    changes: Vec<TransactionalChange>,
}

impl RecordingTransaction {
    /// Creates a transaction reporting `transaction_id`.
    #[must_use]
    pub fn new(transaction_id: i64) -> Self {
        Self {
            transaction_id,
            ..Self::default()
        }
    }

    /// Rows the next query returns. Queries beyond the script return no rows.
    #[must_use]
    pub fn with_result(mut self, rows: Vec<QueryRow>) -> Self {
        self.results.push_back(rows);
        self
    }

    /// Row count the next execute reports.
    #[must_use]
    pub fn with_affected(mut self, rows: u64) -> Self {
        self.affected.push_back(rows);
        self
    }

    /// Row count reported once the scripted counts run out.
    #[must_use]
    pub const fn with_default_affected(mut self, rows: u64) -> Self {
        self.default_affected = rows;
        self
    }

    /// Fails the next execute or query with `error`.
    pub fn fail_next(&mut self, error: BackendError) {
        self.failure = Some(error);
    }

    /// Commands in the order they were given.
    #[must_use]
    pub fn commands(&self) -> &[SqlCommand] {
        &self.commands
    }

    /// Texts of the recorded commands.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.text.as_str()).collect()
    }

    /// How often the transaction id was requested.
    #[must_use]
    pub const fn id_requests(&self) -> usize {
        self.id_requests
    }

    fn take(&mut self, command: &SqlCommand) -> Result<(), BackendError> {
        self.commands.push(command.clone());
        self.failure.take().map_or(Ok(()), Err)
    }
}

impl DatabaseTransaction for RecordingTransaction {
    async fn execute(&mut self, command: &SqlCommand) -> Result<u64, BackendError> {
        self.take(command)?;
        Ok(self.affected.pop_front().unwrap_or(self.default_affected))
    }

    async fn query(&mut self, command: &SqlCommand) -> Result<Vec<QueryRow>, BackendError> {
        self.take(command)?;
        Ok(self.results.pop_front().unwrap_or_default())
    }

    async fn transaction_id(&mut self) -> Result<i64, BackendError> {
        self.id_requests += 1;
        Ok(self.transaction_id)
    }

    fn record(&mut self, change: TransactionalChange) {
        self.changes.push(change);
    }

    fn changes(&self) -> &[TransactionalChange] {
        &self.changes
    }
}
