//! Schema snapshot types.
//!
//! A snapshot is an immutable value tree describing the structure of one
//! database at one point in time. The same shape is produced by the
//! introspector (the live database) and by [`CodeModelBuilder`] (the
//! structure entity metadata expects), so the two can be compared node by
//! node. Names are [`Ident`]s and compare case-insensitively.
//!
//! [`CodeModelBuilder`]: super::CodeModelBuilder

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, Ident};

/// A database and its schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseNode {
    /// Database name.
    pub name: Ident,
    /// Host serving the database.
    pub host: Ident,
    /// Schemas.
    #[serde(default)]
    pub schemas: Vec<SchemaNode>,
}

impl DatabaseNode {
    /// Creates a database without schemas.
    #[must_use]
    pub fn new(name: impl Into<Ident>, host: impl Into<Ident>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            schemas: Vec::new(),
        }
    }

    /// Looks up a schema by name.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&SchemaNode> {
        let name = Ident::from(name);
        self.schemas.iter().find(|s| s.name == name)
    }

    /// `name@host`, used in errors.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}@{}", self.name, self.host)
    }
}

/// A schema and the objects it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: Ident,
    #[serde(default)]
    pub enum_types: Vec<EnumTypeNode>,
    #[serde(default)]
    pub tables: Vec<TableNode>,
    #[serde(default)]
    pub views: Vec<ViewNode>,
    #[serde(default)]
    pub indexes: Vec<IndexNode>,
    #[serde(default)]
    pub functions: Vec<FunctionNode>,
    #[serde(default)]
    pub triggers: Vec<TriggerNode>,
}

impl SchemaNode {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<Ident>) -> Self {
        Self {
            name: name.into(),
            enum_types: Vec::new(),
            tables: Vec::new(),
            views: Vec::new(),
            indexes: Vec::new(),
            functions: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableNode> {
        let name = Ident::from(name);
        self.tables.iter().find(|t| t.name == name)
    }
}

/// A user-defined enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumTypeNode {
    pub schema: Ident,
    pub name: Ident,
    /// Labels in sort order. Labels are case-sensitive.
    pub values: Vec<String>,
}

/// A table and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNode {
    pub schema: Ident,
    pub name: Ident,
    #[serde(default)]
    pub columns: Vec<ColumnNode>,
}

impl TableNode {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnNode> {
        let name = Ident::from(name);
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A column with its type and constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNode {
    pub name: Ident,
    pub data_type: DataType,
    #[serde(default)]
    pub constraints: BTreeSet<ColumnConstraint>,
}

impl ColumnNode {
    /// Creates an unconstrained column.
    #[must_use]
    pub fn new(name: impl Into<Ident>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: BTreeSet::new(),
        }
    }

    /// Adds a constraint.
    #[must_use]
    pub fn with(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        !self.constraints.contains(&ColumnConstraint::NotNull)
    }
}

/// Column-level constraints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
    /// Default value expression.
    Default(String),
    /// Reference to a column of another table.
    ForeignKey {
        schema: Ident,
        table: Ident,
        column: Ident,
        on_delete: ReferentialAction,
    },
}

/// `on delete` behavior of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
}

impl ReferentialAction {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "no action",
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
            Self::SetNull => "set null",
        }
    }
}

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNode {
    pub schema: Ident,
    pub name: Ident,
    /// Defining select statement.
    pub query: String,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    pub schema: Ident,
    pub table: Ident,
    pub name: Ident,
    pub columns: Vec<Ident>,
    #[serde(default)]
    pub included_columns: Vec<Ident>,
    #[serde(default)]
    pub unique: bool,
    /// Partial index condition.
    #[serde(default)]
    pub predicate: Option<String>,
}

/// A trigger function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub schema: Ident,
    pub name: Ident,
    /// PL/pgSQL body.
    pub definition: String,
}

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Before,
    After,
    InsteadOf,
}

impl TriggerType {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::InsteadOf => "instead of",
        }
    }
}

/// Row events a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl TriggerEvent {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A row trigger calling a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerNode {
    pub schema: Ident,
    pub name: Ident,
    pub table: Ident,
    pub function: Ident,
    pub trigger_type: TriggerType,
    pub events: BTreeSet<TriggerEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut schema = SchemaNode::new("Crm");
        schema.tables.push(TableNode {
            schema: Ident::from("crm"),
            name: Ident::from("Person"),
            columns: vec![ColumnNode::new("ID", DataType::Bigint)],
        });
        let mut database = DatabaseNode::new("app", "localhost");
        database.schemas.push(schema);

        let table = database.schema("crm").and_then(|s| s.table("person")).unwrap();
        assert!(table.column("id").is_some());
    }

    #[test]
    fn test_constraint_set_is_order_independent() {
        let a = ColumnNode::new("n", DataType::Integer)
            .with(ColumnConstraint::Unique)
            .with(ColumnConstraint::NotNull);
        let b = ColumnNode::new("N", DataType::Integer)
            .with(ColumnConstraint::NotNull)
            .with(ColumnConstraint::Unique);
        assert_eq!(a, b);
        assert!(!a.is_nullable());
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let json = r#"{
            "name": "app",
            "host": "db",
            "schemas": [{
                "name": "public",
                "tables": [{
                    "schema": "public",
                    "name": "item",
                    "columns": [{
                        "name": "id",
                        "data_type": "Bigint",
                        "constraints": ["primary_key", "not_null"]
                    }]
                }]
            }]
        }"#;
        let database: DatabaseNode = serde_json::from_str(json).unwrap();
        let schema = database.schema("public").unwrap();
        assert!(schema.views.is_empty());
        let column = schema.table("item").and_then(|t| t.column("id")).unwrap();
        assert!(column.constraints.contains(&ColumnConstraint::PrimaryKey));
        assert!(!column.is_nullable());
    }
}
