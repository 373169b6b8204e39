//! Entity metadata.
//!
//! Entities describe themselves with `'static` descriptors. The descriptors
//! drive three things: the columns a query can reference, the rows the
//! repository writes, and the schema the code side expects to exist.
//!
//! ```
//! use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
//!
//! static AUTHORS: EntityDescriptor = EntityDescriptor {
//!     schema: "library",
//!     name: "author",
//!     columns: &[
//!         ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
//!         ColumnDescriptor::new("version", ColumnKind::Version),
//!         ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
//!     ],
//!     indexes: &[],
//! };
//!
//! assert_eq!(AUTHORS.qualified_name(), "\"library\".\"author\"");
//! assert_eq!(AUTHORS.primary_key().map(|c| c.name), Some("id"));
//! ```

mod ident;
mod types;

pub use ident::{quote, Ident};
pub use types::DataType;

use core::fmt;

/// Static description of a persisted entity type and its table.
#[derive(Debug)]
pub struct EntityDescriptor {
    /// Schema holding the table.
    pub schema: &'static str,
    /// Table name.
    pub name: &'static str,
    /// Columns in declaration order, relations included.
    pub columns: &'static [ColumnDescriptor],
    /// Secondary indexes.
    pub indexes: &'static [IndexDescriptor],
}

impl EntityDescriptor {
    /// Returns `"schema"."table"`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote(self.schema), quote(self.name))
    }

    /// Looks up a column by name, ignoring case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the primary key column.
    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| matches!(c.kind, ColumnKind::PrimaryKey(_)))
    }

    /// Returns the optimistic-concurrency version column.
    #[must_use]
    pub fn version_column(&self) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| matches!(c.kind, ColumnKind::Version))
    }

    /// Columns that physically exist in the table (collections live in
    /// junction tables).
    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_collection())
    }

    /// Columns of the key an upsert conflicts on: the first unique index
    /// when one is declared, the primary key otherwise.
    #[must_use]
    pub fn conflict_key(&self) -> Vec<&'static str> {
        if let Some(index) = self.indexes.iter().find(|i| i.unique) {
            return index.columns.to_vec();
        }
        self.primary_key().map(|c| vec![c.name]).unwrap_or_default()
    }

    /// Junction tables synthesized for every collection relation.
    pub fn junctions(&'static self) -> impl Iterator<Item = JunctionTable> {
        self.columns.iter().filter_map(move |column| match column.kind {
            ColumnKind::Collection(target) => Some(JunctionTable {
                owner: self,
                column,
                target: target(),
            }),
            _ => None,
        })
    }

    /// Entity types referenced through single or collection relations.
    pub fn related(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        self.columns.iter().filter_map(|c| match c.kind {
            ColumnKind::Reference(target) | ColumnKind::Collection(target) => Some(target()),
            _ => None,
        })
    }
}

impl PartialEq for EntityDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(other.schema) && self.name.eq_ignore_ascii_case(other.name)
    }
}

impl Eq for EntityDescriptor {}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// What a column stores.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// Primary key of the given type.
    PrimaryKey(DataType),
    /// Optimistic-concurrency version stamp (`bigint`).
    Version,
    /// Plain value column.
    Scalar(DataType),
    /// Column typed by a user-defined enum.
    Enum(&'static EnumDescriptor),
    /// Single-valued relation stored as a foreign key to the target's
    /// primary key.
    Reference(fn() -> &'static EntityDescriptor),
    /// Collection relation stored in a junction table.
    Collection(fn() -> &'static EntityDescriptor),
}

/// Static description of one column.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: &'static str,
    /// Column kind.
    pub kind: ColumnKind,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the column carries a unique constraint.
    pub unique: bool,
    /// Default value expression.
    pub default: Option<&'static str>,
}

impl ColumnDescriptor {
    /// Creates a non-nullable column.
    #[must_use]
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            unique: false,
            default: None,
        }
    }

    /// Allows NULL.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a default value expression.
    #[must_use]
    pub const fn default_value(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Returns true for collection relations.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.kind, ColumnKind::Collection(_))
    }

    /// Returns true for single-valued relations.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self.kind, ColumnKind::Reference(_))
    }

    /// The stored data type. `None` for collections, and for references
    /// whose target has no primary key.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match &self.kind {
            ColumnKind::PrimaryKey(ty) | ColumnKind::Scalar(ty) => Some(ty.clone()),
            ColumnKind::Version => Some(DataType::Bigint),
            ColumnKind::Enum(descriptor) => Some(descriptor.data_type()),
            ColumnKind::Reference(target) => target().primary_key().and_then(Self::data_type),
            ColumnKind::Collection(_) => None,
        }
    }
}

/// A user-defined enum type.
#[derive(Debug)]
pub struct EnumDescriptor {
    /// Schema owning the type.
    pub schema: &'static str,
    /// Type name.
    pub name: &'static str,
    /// Labels in declaration order.
    pub values: &'static [&'static str],
}

impl EnumDescriptor {
    /// The column type referencing this enum.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        DataType::Enum {
            schema: Ident::from_static(self.schema),
            name: Ident::from_static(self.name),
        }
    }
}

/// A secondary index declared on an entity.
#[derive(Debug)]
pub struct IndexDescriptor {
    /// Indexed columns.
    pub columns: &'static [&'static str],
    /// Covering columns (`include (...)`).
    pub included: &'static [&'static str],
    /// Unique index.
    pub unique: bool,
    /// Partial index predicate.
    pub predicate: Option<&'static str>,
}

impl IndexDescriptor {
    /// Creates a plain index over `columns`.
    #[must_use]
    pub const fn new(columns: &'static [&'static str]) -> Self {
        Self {
            columns,
            included: &[],
            unique: false,
            predicate: None,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Generated index name.
    #[must_use]
    pub fn name(&self, table: &str) -> String {
        index_name(table, self.columns)
    }
}

/// Name given to generated indexes: `{table}_{col}_..._idx`.
#[must_use]
pub fn index_name(table: &str, columns: &[&str]) -> String {
    format!("{}_{}_idx", table, columns.join("_"))
}

/// A many-to-many table synthesized for a collection relation.
///
/// The table is named `{owner}_{column}` and holds two columns: `left`
/// referencing the owner's primary key and `right` referencing the target's.
#[derive(Debug, Clone, Copy)]
pub struct JunctionTable {
    /// Entity owning the collection.
    pub owner: &'static EntityDescriptor,
    /// The collection column.
    pub column: &'static ColumnDescriptor,
    /// Entity type held by the collection.
    pub target: &'static EntityDescriptor,
}

impl JunctionTable {
    /// Column referencing the owner.
    pub const LEFT: &'static str = "left";
    /// Column referencing the related entity.
    pub const RIGHT: &'static str = "right";

    /// Schema of the junction table (the owner's schema).
    #[must_use]
    pub const fn schema(&self) -> &'static str {
        self.owner.schema
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}", self.owner.name, self.column.name)
    }

    /// Returns `"schema"."owner_column"`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote(self.schema()), quote(&self.name()))
    }
}
