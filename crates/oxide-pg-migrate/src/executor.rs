//! Migration executor.
//!
//! Renders ordered changes as Postgres DDL, runs the statements through a
//! transaction and records the result in the migration history.

use std::sync::Arc;

use oxide_pg_core::migrations::{ModelChange, PostgresDialect};
use oxide_pg_core::SqlCommand;
use oxide_pg_orm::{DatabaseTransaction, EntityRef, InsertBehavior, OrmError, Repository};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::history::AppliedMigration;

/// Outcome of [`MigrationExecutor::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Migration name.
    pub name: String,
    /// Rendered statements, in execution order.
    pub statements: Vec<String>,
    /// False for dry runs and for migrations without changes.
    pub applied: bool,
}

/// Applies schema changes.
#[derive(Debug, Clone, Default)]
pub struct MigrationExecutor {
    dialect: PostgresDialect,
    repository: Repository,
    dry_run: bool,
}

impl MigrationExecutor {
    /// Creates a new migration executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes history through `repository`, sharing its template cache.
    #[must_use]
    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = repository;
        self
    }

    /// Enables dry-run mode (SQL is logged but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Renders `changes` in order.
    #[must_use]
    pub fn render(&self, changes: &[ModelChange]) -> Vec<String> {
        self.dialect.render_all(changes)
    }

    /// Executes `changes` and records them as migration `name`.
    ///
    /// `changes` must already be ordered, as returned by the extractor.
    ///
    /// # Errors
    ///
    /// Fails on the first statement the database rejects, and when the
    /// history row cannot be written. Earlier statements are not undone;
    /// roll back the transaction.
    pub async fn apply<T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        name: &str,
        changes: &[ModelChange],
    ) -> Result<MigrationReport> {
        let statements = self.render(changes);
        if statements.is_empty() {
            info!(migration = name, "schema is up to date");
            return Ok(MigrationReport {
                name: name.to_string(),
                statements,
                applied: false,
            });
        }

        if self.dry_run {
            for statement in &statements {
                info!(migration = name, sql = %statement, "dry run");
            }
            return Ok(MigrationReport {
                name: name.to_string(),
                statements,
                applied: false,
            });
        }

        if changes
            .iter()
            .any(|change| matches!(change, ModelChange::CreateDatabase { .. }))
        {
            warn!(migration = name, "creating a database cannot run inside a transaction block");
        }

        info!(migration = name, statements = statements.len(), "applying migration");
        for statement in &statements {
            debug!(sql = %statement, "executing");
            let command = SqlCommand::new(statement.as_str());
            tx.execute(&command)
                .await
                .map_err(|e| OrmError::classify(&command, e))?;
        }

        let record: EntityRef = Arc::new(AppliedMigration::new(name, statements.clone())?);
        self.repository
            .insert(tx, &[record], InsertBehavior::Default)
            .await?;
        info!(migration = name, "recorded migration");

        Ok(MigrationReport {
            name: name.to_string(),
            statements,
            applied: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_pg_core::schema::Ident;
    use oxide_pg_orm::RecordingTransaction;

    fn schema(name: &str) -> ModelChange {
        ModelChange::CreateSchema {
            schema: Ident::from(name),
        }
    }

    #[tokio::test]
    async fn test_apply_runs_statements_then_history() {
        let mut tx = RecordingTransaction::new(5);
        let report = MigrationExecutor::new()
            .apply(&mut tx, "0001_shop", &[schema("shop")])
            .await
            .unwrap();

        assert!(report.applied);
        assert_eq!(report.statements, vec![r#"create schema "shop""#]);
        let texts = tx.texts();
        assert_eq!(texts[0], r#"create schema "shop""#);
        assert!(texts[1].starts_with(
            r#"insert into "oxide_migrations"."applied_migration" ("name", "version", "applied_at", "commands")"#
        ));
        assert_eq!(tx.changes().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let mut tx = RecordingTransaction::new(5);
        let report = MigrationExecutor::new()
            .dry_run(true)
            .apply(&mut tx, "0001_shop", &[schema("shop")])
            .await
            .unwrap();

        assert!(!report.applied);
        assert_eq!(report.statements.len(), 1);
        assert!(tx.commands().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_apply() {
        let mut tx = RecordingTransaction::new(5);
        let report = MigrationExecutor::new().apply(&mut tx, "noop", &[]).await.unwrap();
        assert!(!report.applied);
        assert!(tx.commands().is_empty());
        assert!(tx.changes().is_empty());
    }
}
