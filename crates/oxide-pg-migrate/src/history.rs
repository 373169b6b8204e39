//! Migration history tracking.
//!
//! Every applied migration leaves one row in
//! `"oxide_migrations"."applied_migration"`. The table is declared as an
//! ordinary entity so that it is part of every expected model and is
//! written through the repository's insert path.

use chrono::{DateTime, Utc};
use oxide_pg_core::query::Query;
use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
use oxide_pg_core::translate::translate_query;
use oxide_pg_orm::{
    DatabaseTransaction, Entity, EntityType, OrmError, QueryRow, SqlValue, VersionStamp,
};

use crate::error::{MigrateError, Result};

/// Schema holding the history table.
pub const HISTORY_SCHEMA: &str = "oxide_migrations";

/// The history table.
pub static APPLIED_MIGRATION: EntityDescriptor = EntityDescriptor {
    schema: HISTORY_SCHEMA,
    name: "applied_migration",
    columns: &[
        ColumnDescriptor::new("name", ColumnKind::PrimaryKey(DataType::Text)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("applied_at", ColumnKind::Scalar(DataType::TimestampTz)),
        ColumnDescriptor::new("commands", ColumnKind::Scalar(DataType::Text)),
    ],
    indexes: &[],
};

/// A record of an applied migration.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Migration name.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
    /// Statements the migration executed, in order.
    pub commands: Vec<String>,
    /// The statements as stored: a JSON array.
    commands_json: String,
    version: VersionStamp,
}

impl AppliedMigration {
    /// Creates a record for statements applied now.
    ///
    /// # Errors
    ///
    /// Returns an error if the statements cannot be serialized.
    pub fn new(name: impl Into<String>, commands: Vec<String>) -> Result<Self> {
        Self::at(name, Utc::now(), commands)
    }

    /// Creates a record with an explicit application time.
    ///
    /// # Errors
    ///
    /// Returns an error if the statements cannot be serialized.
    pub fn at(
        name: impl Into<String>,
        applied_at: DateTime<Utc>,
        commands: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            applied_at,
            commands_json: serde_json::to_string(&commands)?,
            commands,
            version: VersionStamp::default(),
        })
    }

    /// Reads a record from a history query row.
    ///
    /// # Errors
    ///
    /// Fails when a column is missing, has the wrong type, or the stored
    /// statements are not a JSON array of strings.
    pub fn from_row(row: &QueryRow) -> Result<Self> {
        let missing = |column: &str| MigrateError::InvalidHistory(format!("missing {column}"));
        let Some(SqlValue::Text(name)) = row.get("name") else {
            return Err(missing("name"));
        };
        let Some(SqlValue::TimestampTz(applied_at)) = row.get("applied_at") else {
            return Err(missing("applied_at"));
        };
        let Some(SqlValue::Text(commands_json)) = row.get("commands") else {
            return Err(missing("commands"));
        };
        let version = match row.get("version") {
            Some(SqlValue::Int(version)) => *version,
            _ => return Err(missing("version")),
        };
        Ok(Self {
            name: name.clone(),
            applied_at: *applied_at,
            commands: serde_json::from_str(commands_json)?,
            commands_json: commands_json.clone(),
            version: VersionStamp::new(version),
        })
    }
}

impl Entity for AppliedMigration {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &APPLIED_MIGRATION
    }

    fn key(&self) -> SqlValue {
        SqlValue::Text(self.name.clone())
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        match column {
            "applied_at" => Some(SqlValue::TimestampTz(self.applied_at)),
            "commands" => Some(SqlValue::Text(self.commands_json.clone())),
            _ => None,
        }
    }

    fn version(&self) -> i64 {
        self.version.get()
    }

    fn set_version(&self, version: i64) {
        self.version.set(version);
    }
}

impl EntityType for AppliedMigration {
    const DESCRIPTOR: &'static EntityDescriptor = &APPLIED_MIGRATION;
}

/// Lists applied migrations in application order.
///
/// # Errors
///
/// Returns an error if the history cannot be queried or a row is malformed.
pub async fn applied_migrations<T: DatabaseTransaction>(
    tx: &mut T,
) -> Result<Vec<AppliedMigration>> {
    let query = Query::of(&APPLIED_MIGRATION);
    let mut command = translate_query(query.expr()).map_err(OrmError::from)?;
    command.text.push_str(r#" order by a."applied_at", a."name""#);
    let rows = tx
        .query(&command)
        .await
        .map_err(|e| OrmError::classify(&command, e))?;
    rows.iter().map(AppliedMigration::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(commands: &str) -> QueryRow {
        QueryRow::new()
            .with("name", SqlValue::Text(String::from("0001")))
            .with("version", SqlValue::Int(12))
            .with(
                "applied_at",
                SqlValue::TimestampTz(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()),
            )
            .with("commands", SqlValue::Text(commands.to_string()))
    }

    #[test]
    fn test_entity_values() {
        let record = AppliedMigration::new(
            "0001",
            vec![String::from(r#"create schema "shop""#)],
        )
        .unwrap();
        assert_eq!(record.key(), SqlValue::Text(String::from("0001")));
        assert_eq!(
            record.value("commands"),
            Some(SqlValue::Text(String::from(r#"["create schema \"shop\""]"#)))
        );
        assert_eq!(record.version(), 0);
    }

    #[test]
    fn test_from_row() {
        let record = AppliedMigration::from_row(&row(r#"["a", "b"]"#)).unwrap();
        assert_eq!(record.name, "0001");
        assert_eq!(record.commands, vec!["a", "b"]);
        assert_eq!(record.version(), 12);
    }

    #[test]
    fn test_from_row_rejects_malformed_rows() {
        assert!(matches!(
            AppliedMigration::from_row(&row("not json")),
            Err(MigrateError::Serialization(_))
        ));
        assert!(matches!(
            AppliedMigration::from_row(&QueryRow::new()),
            Err(MigrateError::InvalidHistory(message)) if message == "missing name"
        ));
    }
}
