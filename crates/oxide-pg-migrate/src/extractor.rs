//! Extraction of the changes that bring a database up to date.

use oxide_pg_core::migrations::{compare, sort_changes, CodeModelBuilder, DatabaseNode, ModelChange};
use oxide_pg_core::schema::EntityDescriptor;
use oxide_pg_orm::{DatabaseSettings, DatabaseTransaction};
use tracing::{debug, info};

use crate::error::Result;
use crate::history::APPLIED_MIGRATION;
use crate::introspect::SchemaIntrospector;

/// Compares the live database with the model entity types expect.
#[derive(Debug, Clone)]
pub struct ModelChangesExtractor<I> {
    introspector: I,
    database: String,
    host: String,
}

impl<I: SchemaIntrospector> ModelChangesExtractor<I> {
    /// Creates an extractor for database `database` on `host`.
    pub fn new(introspector: I, database: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            introspector,
            database: database.into(),
            host: host.into(),
        }
    }

    /// Creates an extractor for the database the settings point at.
    pub fn for_settings(introspector: I, settings: &DatabaseSettings) -> Self {
        Self::new(introspector, &settings.database, &settings.host)
    }

    /// The model `builder` describes, plus the migration history table.
    ///
    /// # Errors
    ///
    /// Fails for entities without a primary key.
    pub fn expected_model(&self, builder: CodeModelBuilder) -> Result<DatabaseNode> {
        Ok(builder
            .entity(&APPLIED_MIGRATION)
            .build(&self.database, &self.host)?)
    }

    /// Ordered changes that bring the live database to the model of
    /// `entity_types`.
    ///
    /// # Errors
    ///
    /// Fails when introspection fails, when the changes would drop the
    /// database, a schema or a table, and when they cannot be ordered.
    pub async fn extract_changes<T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        entity_types: &[&'static EntityDescriptor],
    ) -> Result<Vec<ModelChange>> {
        let builder = entity_types
            .iter()
            .fold(CodeModelBuilder::new(), |builder, entity| builder.entity(*entity));
        self.extract_model_changes(tx, builder).await
    }

    /// Like [`extract_changes`](Self::extract_changes) for a model that
    /// also declares views, functions or triggers.
    ///
    /// # Errors
    ///
    /// See [`extract_changes`](Self::extract_changes).
    pub async fn extract_model_changes<T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        builder: CodeModelBuilder,
    ) -> Result<Vec<ModelChange>> {
        let expected = self.expected_model(builder)?;
        let actual = self
            .introspector
            .introspect(tx, &self.database, &self.host)
            .await?;
        debug!(
            database = %expected.identity(),
            exists = actual.is_some(),
            "comparing schema snapshots"
        );

        let changes = sort_changes(compare(actual.as_ref(), Some(&expected))?)?;
        info!(changes = changes.len(), database = %expected.identity(), "extracted model changes");
        for change in &changes {
            debug!(%change, "pending change");
        }
        Ok(changes)
    }
}
