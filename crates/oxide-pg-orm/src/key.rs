//! Identity of persisted rows.

use core::fmt;

use oxide_pg_core::SqlValue;

/// A primary-key value usable as a map key.
///
/// [`SqlValue`] holds floats and so is neither `Eq` nor `Hash`; keys of
/// other types are compared through their inline rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Other(String),
}

impl From<&SqlValue> for KeyValue {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Int(n) => Self::Int(*n),
            SqlValue::Text(s) => Self::Text(s.clone()),
            SqlValue::Bytes(b) => Self::Bytes(b.clone()),
            other => Self::Other(other.to_sql_inline()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) | Self::Other(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "{} bytes", b.len()),
        }
    }
}

/// A table, by its quoted qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(String);

impl TableId {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self(qualified_name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `(table, primary key)` identity of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub table: TableId,
    pub key: KeyValue,
}

impl EntityKey {
    pub fn new(table: TableId, key: &SqlValue) -> Self {
        Self {
            table,
            key: KeyValue::from(key),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    #[test]
    fn test_key_equality() {
        let table = TableId::new(r#""s"."t""#);
        let a = EntityKey::new(table.clone(), &SqlValue::Int(1));
        let b = EntityKey::new(table.clone(), &SqlValue::Int(1));
        let c = EntityKey::new(table, &SqlValue::Text(String::from("1")));
        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_other_values_use_inline_form() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            KeyValue::from(&SqlValue::Date(date)),
            KeyValue::Other(String::from("'2024-02-29'::date"))
        );
    }

    #[test]
    fn test_display() {
        let key = EntityKey::new(TableId::new("s.t"), &SqlValue::Int(7));
        assert_eq!(key.to_string(), "s.t[7]");
    }
}
