//! The live-database side of a comparison.

use oxide_pg_core::migrations::DatabaseNode;
use oxide_pg_core::Ident;
use oxide_pg_orm::DatabaseTransaction;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Describes the structure of the database a transaction is connected to.
///
/// Implementations return `None` when the database does not exist yet.
#[allow(async_fn_in_trait)]
pub trait SchemaIntrospector {
    async fn introspect<T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        database: &str,
        host: &str,
    ) -> Result<Option<DatabaseNode>>;
}

/// Serves a snapshot captured earlier instead of reading the catalog.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIntrospector {
    snapshot: Option<DatabaseNode>,
}

impl SnapshotIntrospector {
    #[must_use]
    pub const fn new(snapshot: Option<DatabaseNode>) -> Self {
        Self { snapshot }
    }

    /// Loads a snapshot serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a serialized [`DatabaseNode`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(Some(serde_json::from_str(json)?)))
    }

    #[must_use]
    pub const fn snapshot(&self) -> Option<&DatabaseNode> {
        self.snapshot.as_ref()
    }
}

impl SchemaIntrospector for SnapshotIntrospector {
    async fn introspect<T: DatabaseTransaction>(
        &self,
        _tx: &mut T,
        database: &str,
        host: &str,
    ) -> Result<Option<DatabaseNode>> {
        let Some(snapshot) = &self.snapshot else {
            debug!(database, host, "no snapshot, database treated as missing");
            return Ok(None);
        };
        if snapshot.name != Ident::from(database) || snapshot.host != Ident::from(host) {
            return Err(MigrateError::Introspection(format!(
                "snapshot describes {}, not {database}@{host}",
                snapshot.identity()
            )));
        }
        Ok(Some(snapshot.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_pg_orm::RecordingTransaction;

    #[tokio::test]
    async fn test_snapshot_from_json() {
        let introspector = SnapshotIntrospector::from_json(
            r#"{"name": "app", "host": "localhost", "schemas": [{"name": "shop"}]}"#,
        )
        .unwrap();
        let mut tx = RecordingTransaction::new(1);
        let snapshot = introspector
            .introspect(&mut tx, "APP", "localhost")
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.schema("shop").is_some());
        assert!(tx.commands().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_mismatched_snapshots() {
        let mut tx = RecordingTransaction::new(1);
        let missing = SnapshotIntrospector::default()
            .introspect(&mut tx, "app", "localhost")
            .await
            .unwrap();
        assert!(missing.is_none());

        let other = SnapshotIntrospector::new(Some(DatabaseNode::new("other", "localhost")));
        assert!(matches!(
            other.introspect(&mut tx, "app", "localhost").await,
            Err(MigrateError::Introspection(_))
        ));
    }

    #[test]
    fn test_malformed_snapshot() {
        assert!(matches!(
            SnapshotIntrospector::from_json("[]"),
            Err(MigrateError::Serialization(_))
        ));
    }
}
