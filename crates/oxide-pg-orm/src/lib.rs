//! # oxide-pg-orm
//!
//! Graph-aware persistence for entities described by
//! [`oxide_pg_core::schema`] metadata.
//!
//! This crate provides:
//! - [`Entity`] and [`EntityType`] for in-memory rows and their types
//! - [`Repository`] for inserts of whole entity graphs, and for updates and
//!   deletes addressed by a typed predicate
//! - Dependency ordering of inserted rows, with nullable references
//!   deferred to break cycles
//! - A cache of multi-row insert templates
//! - [`DatabaseTransaction`], implemented over sqlx by [`PgTransaction`] and
//!   in memory by [`RecordingTransaction`]
//!
//! Every repository call records a [`TransactionalChange`] in the
//! transaction's change log, carrying the prior row versions it replaced.
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_pg_orm::{Assignment, DatabaseSettings, InsertBehavior, PgTransaction, Repository};
//!
//! async fn example(settings: &DatabaseSettings, customer: EntityRef) -> oxide_pg_orm::Result<()> {
//!     let pool = settings.connect().await?;
//!     let repository = Repository::new();
//!
//!     let mut tx = PgTransaction::begin(&pool).await?;
//!     repository.insert(&mut tx, &[customer], InsertBehavior::Default).await?;
//!     repository
//!         .update::<Customer, _>(
//!             &mut tx,
//!             &[Assignment::set::<Customer>("active", false)],
//!             |c| c.field("name").equals("ann"),
//!         )
//!         .await?;
//!     let changes = tx.commit().await?;
//!     Ok(())
//! }
//! ```

mod entity;
mod error;
pub mod flatten;
mod key;
pub mod ordering;
mod pg;
mod recording;
mod repository;
mod settings;
pub mod template;
mod transaction;

#[cfg(test)]
mod fixtures;

pub use entity::{Entity, EntityRef, EntityType, Relation, VersionStamp};
pub use error::{BackendError, OrmError, Result, SERIALIZATION_FAILURE, UNIQUE_VIOLATION};
pub use key::{EntityKey, KeyValue, TableId};
pub use pg::{to_positional, PgTransaction};
pub use recording::RecordingTransaction;
pub use repository::{Assignment, Repository};
pub use settings::DatabaseSettings;
pub use template::{InsertBehavior, InsertTemplateCache};
pub use transaction::{DatabaseTransaction, QueryRow, TransactionalChange};

// Re-export commonly used types from oxide-pg-core
pub use oxide_pg_core::{SqlCommand, SqlValue, ToSqlValue};
