//! Column data types.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::Ident;

/// Postgres column data types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    // Integer types
    /// Small integer (2 bytes).
    Smallint,
    /// Integer (4 bytes).
    Integer,
    /// Big integer (8 bytes).
    Bigint,

    // Floating point
    /// Real (4-byte float).
    Real,
    /// Double precision (8-byte float).
    Double,
    /// Numeric with optional precision and scale.
    Numeric {
        /// Total number of digits.
        precision: Option<u16>,
        /// Number of digits after decimal point.
        scale: Option<u16>,
    },

    // String types
    /// Fixed-length character string.
    Char(Option<u32>),
    /// Variable-length character string.
    Varchar(Option<u32>),
    /// Text (variable length, no limit).
    Text,

    /// Binary string.
    Bytea,

    // Date/time types
    /// Date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,

    /// Boolean.
    Boolean,
    /// UUID.
    Uuid,
    /// Binary JSON.
    Jsonb,

    /// A user-defined enum type.
    Enum {
        /// Schema owning the type.
        schema: Ident,
        /// Type name.
        name: Ident,
    },
}

impl DataType {
    /// Returns the SQL representation of the data type.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Smallint => String::from("smallint"),
            Self::Integer => String::from("integer"),
            Self::Bigint => String::from("bigint"),
            Self::Real => String::from("real"),
            Self::Double => String::from("double precision"),
            Self::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("numeric({p}, {s})"),
                (Some(p), None) => format!("numeric({p})"),
                _ => String::from("numeric"),
            },
            Self::Char(len) => match len {
                Some(n) => format!("char({n})"),
                None => String::from("char"),
            },
            Self::Varchar(len) => match len {
                Some(n) => format!("varchar({n})"),
                None => String::from("varchar"),
            },
            Self::Text => String::from("text"),
            Self::Bytea => String::from("bytea"),
            Self::Date => String::from("date"),
            Self::Time => String::from("time"),
            Self::Timestamp => String::from("timestamp"),
            Self::TimestampTz => String::from("timestamptz"),
            Self::Boolean => String::from("boolean"),
            Self::Uuid => String::from("uuid"),
            Self::Jsonb => String::from("jsonb"),
            Self::Enum { schema, name } => format!("{}.{}", schema.quoted(), name.quoted()),
        }
    }

    /// Returns true for user-defined enum types.
    #[must_use]
    pub const fn is_enum(&self) -> bool {
        matches!(self, Self::Enum { .. })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
