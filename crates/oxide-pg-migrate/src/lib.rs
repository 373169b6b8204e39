//! Schema reconciliation for `oxide-pg` entity models.
//!
//! `oxide-pg-migrate` brings a live Postgres database in line with the
//! structure its entity types expect:
//! - The expected snapshot is derived from entity metadata
//! - The live snapshot comes from a [`SchemaIntrospector`]
//! - The two are compared and the changes ordered by dependency
//! - The ordered changes are rendered as DDL and applied in one transaction
//!
//! Implicit drops of databases, schemas and tables are refused.
//!
//! # Architecture
//!
//! - **Extractor** - Compares snapshots and orders the resulting changes
//! - **Executor** - Renders and applies changes, tracking history
//! - **History** - The `applied_migration` table, itself part of every model
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_pg_migrate::{MigrationExecutor, ModelChangesExtractor};
//! use oxide_pg_orm::PgTransaction;
//!
//! let extractor = ModelChangesExtractor::for_settings(introspector, &settings);
//! let mut tx = PgTransaction::begin(&pool).await?;
//! let changes = extractor.extract_changes(&mut tx, &[&CUSTOMER, &PURCHASE]).await?;
//! MigrationExecutor::new().apply(&mut tx, "0002_purchases", &changes).await?;
//! tx.commit().await?;
//! ```

mod error;
mod executor;
mod extractor;
pub mod history;
mod introspect;

pub use error::{MigrateError, Result};
pub use executor::{MigrationExecutor, MigrationReport};
pub use extractor::ModelChangesExtractor;
pub use history::{applied_migrations, AppliedMigration, APPLIED_MIGRATION, HISTORY_SCHEMA};
pub use introspect::{SchemaIntrospector, SnapshotIntrospector};
