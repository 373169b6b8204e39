//! Result types carried by query expressions and IR nodes.

use core::fmt;

use crate::command::SqlValue;
use crate::schema::{ColumnKind, DataType, EntityDescriptor};

/// Scalar value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Integer,
    Float,
    Numeric,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
    /// A user-defined enum, by type name.
    Enum(String),
    /// The type of a NULL literal.
    Null,
}

impl ScalarType {
    /// Type of a bound value.
    #[must_use]
    pub const fn of(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Bool(_) => Self::Bool,
            SqlValue::Int(_) => Self::Integer,
            SqlValue::Float(_) => Self::Float,
            SqlValue::Text(_) => Self::Text,
            SqlValue::Bytes(_) => Self::Bytes,
            SqlValue::Date(_) => Self::Date,
            SqlValue::Timestamp(_) | SqlValue::TimestampTz(_) => Self::Timestamp,
        }
    }

    /// Type of a column of the given data type.
    #[must_use]
    pub fn from_data_type(data_type: &DataType) -> Self {
        match data_type {
            DataType::Smallint | DataType::Integer | DataType::Bigint => Self::Integer,
            DataType::Real | DataType::Double => Self::Float,
            DataType::Numeric { .. } => Self::Numeric,
            DataType::Char(_) | DataType::Varchar(_) | DataType::Text => Self::Text,
            DataType::Bytea => Self::Bytes,
            DataType::Date => Self::Date,
            DataType::Time => Self::Time,
            DataType::Timestamp | DataType::TimestampTz => Self::Timestamp,
            DataType::Boolean => Self::Bool,
            DataType::Uuid => Self::Uuid,
            DataType::Jsonb => Self::Json,
            DataType::Enum { name, .. } => Self::Enum(name.to_string()),
        }
    }
}

/// A record produced by a class-shaped projection or a grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    /// Record type name; `None` for anonymous records.
    pub name: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, QueryType)>,
}

/// The result type of an expression or IR node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryType {
    /// A single value.
    Scalar(ScalarType),
    /// A row of an entity table.
    Entity(&'static EntityDescriptor),
    /// A projected record.
    Record(RecordType),
    /// A member that could not be resolved.
    Unknown,
}

impl QueryType {
    /// Boolean scalar.
    pub const BOOL: Self = Self::Scalar(ScalarType::Bool);

    /// Resolves the type of `member` on this type.
    #[must_use]
    pub fn member(&self, member: &str) -> Self {
        match self {
            Self::Entity(entity) => entity.column(member).map_or(Self::Unknown, |column| {
                match &column.kind {
                    ColumnKind::Reference(target) => Self::Entity(target()),
                    ColumnKind::Collection(_) => Self::Unknown,
                    _ => column
                        .data_type()
                        .map_or(Self::Unknown, |ty| Self::Scalar(ScalarType::from_data_type(&ty))),
                }
            }),
            Self::Record(record) => record
                .fields
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(member))
                .map_or(Self::Unknown, |(_, ty)| ty.clone()),
            Self::Scalar(_) | Self::Unknown => Self::Unknown,
        }
    }

    /// Field names of the rows this type describes.
    #[must_use]
    pub fn row_fields(&self) -> Option<Vec<String>> {
        match self {
            Self::Entity(entity) => Some(
                entity
                    .stored_columns()
                    .map(|c| c.name.to_string())
                    .collect(),
            ),
            Self::Record(record) => Some(record.fields.iter().map(|(n, _)| n.clone()).collect()),
            Self::Scalar(_) | Self::Unknown => None,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{scalar:?}"),
            Self::Entity(entity) => write!(f, "{entity}"),
            Self::Record(RecordType { name: Some(name), .. }) => f.write_str(name),
            Self::Record(RecordType { name: None, .. }) => f.write_str("<anonymous>"),
            Self::Unknown => f.write_str("<unknown>"),
        }
    }
}
