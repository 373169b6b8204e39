//! Schema snapshot comparison.
//!
//! Compares an "actual" (live database) and an "expected" (derived from
//! entity metadata) [`DatabaseNode`] and produces the unordered set of
//! [`ModelChange`]s that reconciles the former with the latter. Databases,
//! schemas and tables are never dropped implicitly: finding one that the
//! expected model does not know is an error.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::schema::Ident;

use super::change::{ColumnChange, EnumValueChange, ModelChange};
use super::snapshot::{
    ColumnNode, DatabaseNode, EnumTypeNode, IndexNode, SchemaNode, TableNode,
};

/// How an item of one side pairs with the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing<'a, T> {
    /// Present on both sides: `(actual, expected)`.
    Both(&'a T, &'a T),
    /// Present only in the live database.
    ActualOnly(&'a T),
    /// Present only in the expected model.
    ExpectedOnly(&'a T),
}

/// Pairs two collections by `key`.
///
/// Actual items come first, in their order, each paired with the first
/// unclaimed expected item of equal key; unclaimed expected items follow in
/// their order.
pub fn full_outer_join<'a, T, K, F>(
    actual: &'a [T],
    expected: &'a [T],
    key: F,
) -> Vec<Pairing<'a, T>>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let expected_keys: Vec<K> = expected.iter().map(&key).collect();
    let mut claimed = vec![false; expected.len()];
    let mut pairings = Vec::with_capacity(actual.len().max(expected.len()));

    for item in actual {
        let k = key(item);
        let matched = expected_keys
            .iter()
            .enumerate()
            .position(|(i, candidate)| !claimed[i] && *candidate == k);
        match matched {
            Some(i) => {
                claimed[i] = true;
                pairings.push(Pairing::Both(item, &expected[i]));
            }
            None => pairings.push(Pairing::ActualOnly(item)),
        }
    }
    pairings.extend(
        expected
            .iter()
            .zip(claimed)
            .filter(|(_, claimed)| !claimed)
            .map(|(item, _)| Pairing::ExpectedOnly(item)),
    );
    pairings
}

/// Computes the changes that turn `actual` into `expected`.
///
/// # Errors
///
/// Fails when neither side exists, when the expected model drops the
/// database, a schema or a table, and when the two sides denote different
/// databases.
pub fn compare(
    actual: Option<&DatabaseNode>,
    expected: Option<&DatabaseNode>,
) -> Result<Vec<ModelChange>, SchemaError> {
    let mut comparator = Comparator::default();
    match (actual, expected) {
        (None, None) => return Err(SchemaError::WrongDatabaseChange),
        (Some(actual), None) => {
            warn!(database = %actual.identity(), "expected model has no database");
            return Err(SchemaError::ImplicitDatabaseDrop(actual.identity()));
        }
        (None, Some(expected)) => {
            comparator.push(ModelChange::CreateDatabase {
                database: expected.name.clone(),
            });
            comparator.schemas(&[], &expected.schemas)?;
        }
        (Some(actual), Some(expected)) => {
            if actual.name != expected.name || actual.host != expected.host {
                return Err(SchemaError::DatabaseMismatch {
                    actual: actual.identity(),
                    expected: expected.identity(),
                });
            }
            comparator.schemas(&actual.schemas, &expected.schemas)?;
        }
    }
    debug!(changes = comparator.changes.len(), "compared schema snapshots");
    Ok(comparator.changes)
}

#[derive(Default)]
struct Comparator {
    changes: Vec<ModelChange>,
}

impl Comparator {
    fn push(&mut self, change: ModelChange) {
        self.changes.push(change);
    }

    fn schemas(
        &mut self,
        actual: &[SchemaNode],
        expected: &[SchemaNode],
    ) -> Result<(), SchemaError> {
        for pairing in full_outer_join(actual, expected, |s| s.name.clone()) {
            match pairing {
                Pairing::Both(actual, expected) => self.schema(actual, expected)?,
                Pairing::ActualOnly(actual) => {
                    warn!(schema = %actual.name, "schema missing from the expected model");
                    return Err(SchemaError::ImplicitSchemaDrop(actual.name.to_string()));
                }
                Pairing::ExpectedOnly(expected) => {
                    self.push(ModelChange::CreateSchema {
                        schema: expected.name.clone(),
                    });
                    self.schema(&SchemaNode::new(expected.name.clone()), expected)?;
                }
            }
        }
        Ok(())
    }

    fn schema(&mut self, actual: &SchemaNode, expected: &SchemaNode) -> Result<(), SchemaError> {
        self.enum_types(&actual.enum_types, &expected.enum_types);
        self.tables(&actual.tables, &expected.tables)?;

        self.replace(
            &actual.views,
            &expected.views,
            |view| view.name.clone(),
            |view| ModelChange::CreateView { view: view.clone() },
            |view| ModelChange::DropView {
                schema: view.schema.clone(),
                view: view.name.clone(),
            },
        );
        self.replace(
            &actual.indexes,
            &expected.indexes,
            index_key,
            |index| ModelChange::CreateIndex {
                index: index.clone(),
            },
            |index| ModelChange::DropIndex {
                index: index.clone(),
            },
        );
        self.replace(
            &actual.functions,
            &expected.functions,
            |function| function.name.clone(),
            |function| ModelChange::CreateFunction {
                function: function.clone(),
            },
            |function| ModelChange::DropFunction {
                schema: function.schema.clone(),
                function: function.name.clone(),
            },
        );
        self.replace(
            &actual.triggers,
            &expected.triggers,
            |trigger| (trigger.table.clone(), trigger.name.clone()),
            |trigger| ModelChange::CreateTrigger {
                trigger: trigger.clone(),
            },
            |trigger| ModelChange::DropTrigger {
                trigger: trigger.clone(),
            },
        );
        Ok(())
    }

    /// Objects without in-place alteration: unequal pairs are dropped and
    /// recreated.
    fn replace<T, K>(
        &mut self,
        actual: &[T],
        expected: &[T],
        key: impl Fn(&T) -> K,
        create: impl Fn(&T) -> ModelChange,
        drop: impl Fn(&T) -> ModelChange,
    ) where
        T: PartialEq,
        K: PartialEq,
    {
        for pairing in full_outer_join(actual, expected, key) {
            match pairing {
                Pairing::Both(actual, expected) if actual == expected => {}
                Pairing::Both(actual, expected) => {
                    self.push(drop(actual));
                    self.push(create(expected));
                }
                Pairing::ActualOnly(actual) => self.push(drop(actual)),
                Pairing::ExpectedOnly(expected) => self.push(create(expected)),
            }
        }
    }

    fn enum_types(&mut self, actual: &[EnumTypeNode], expected: &[EnumTypeNode]) {
        for pairing in full_outer_join(actual, expected, |e| e.name.clone()) {
            match pairing {
                Pairing::Both(actual, expected) if actual == expected => {}
                Pairing::Both(actual, expected) => self.enum_values(actual, expected),
                Pairing::ActualOnly(actual) => self.push(ModelChange::DropEnumType {
                    schema: actual.schema.clone(),
                    name: actual.name.clone(),
                }),
                Pairing::ExpectedOnly(expected) => self.push(ModelChange::CreateEnumType {
                    schema: expected.schema.clone(),
                    name: expected.name.clone(),
                    values: expected.values.clone(),
                }),
            }
        }
    }

    fn enum_values(&mut self, actual: &EnumTypeNode, expected: &EnumTypeNode) {
        let values = full_outer_join(&actual.values, &expected.values, |v| {
            v.to_ascii_lowercase()
        });
        for pairing in values {
            let change = match pairing {
                Pairing::Both(from, to) if from == to => continue,
                Pairing::Both(from, to) => EnumValueChange::Rename {
                    from: from.clone(),
                    to: to.clone(),
                },
                Pairing::ActualOnly(value) => EnumValueChange::Remove(value.clone()),
                Pairing::ExpectedOnly(value) => EnumValueChange::Add(value.clone()),
            };
            self.push(ModelChange::AlterEnumType {
                schema: expected.schema.clone(),
                name: expected.name.clone(),
                change,
            });
        }
    }

    fn tables(&mut self, actual: &[TableNode], expected: &[TableNode]) -> Result<(), SchemaError> {
        for pairing in full_outer_join(actual, expected, |t| t.name.clone()) {
            match pairing {
                Pairing::Both(actual, expected) => self.columns(actual, expected),
                Pairing::ActualOnly(actual) => {
                    warn!(
                        schema = %actual.schema,
                        table = %actual.name,
                        "table missing from the expected model"
                    );
                    return Err(SchemaError::ImplicitTableDrop {
                        schema: actual.schema.to_string(),
                        table: actual.name.to_string(),
                    });
                }
                Pairing::ExpectedOnly(expected) => {
                    self.push(ModelChange::CreateTable {
                        schema: expected.schema.clone(),
                        table: expected.name.clone(),
                    });
                    let empty = TableNode {
                        schema: expected.schema.clone(),
                        name: expected.name.clone(),
                        columns: Vec::new(),
                    };
                    self.columns(&empty, expected);
                }
            }
        }
        Ok(())
    }

    fn columns(&mut self, actual: &TableNode, expected: &TableNode) {
        let schema = &expected.schema;
        let table = &expected.name;
        for pairing in full_outer_join(&actual.columns, &expected.columns, |c| c.name.clone()) {
            match pairing {
                Pairing::Both(actual, expected) if actual == expected => {}
                Pairing::Both(actual, expected) => self.column(schema, table, actual, expected),
                Pairing::ActualOnly(actual) => self.push(ModelChange::DropColumn {
                    schema: schema.clone(),
                    table: table.clone(),
                    column: actual.name.clone(),
                }),
                Pairing::ExpectedOnly(expected) => self.push(ModelChange::CreateColumn {
                    schema: schema.clone(),
                    table: table.clone(),
                    column: expected.clone(),
                }),
            }
        }
    }

    fn column(
        &mut self,
        schema: &Ident,
        table: &Ident,
        actual: &ColumnNode,
        expected: &ColumnNode,
    ) {
        let mut alter = |change| {
            self.changes.push(ModelChange::AlterColumn {
                schema: schema.clone(),
                table: table.clone(),
                column: expected.name.clone(),
                change,
            });
        };
        if actual.data_type != expected.data_type {
            alter(ColumnChange::SetDataType(expected.data_type.clone()));
        }
        for removed in actual.constraints.difference(&expected.constraints) {
            alter(ColumnChange::DropConstraint(removed.clone()));
        }
        for added in expected.constraints.difference(&actual.constraints) {
            alter(ColumnChange::AddConstraint(added.clone()));
        }
    }
}

/// Indexes pair by table, name and column set.
fn index_key(index: &IndexNode) -> (Ident, Ident, BTreeSet<Ident>) {
    (
        index.table.clone(),
        index.name.clone(),
        index.columns.iter().cloned().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_outer_join_classifies_pairs() {
        let actual = ["a", "B", "c"];
        let expected = ["b", "d", "A"];
        let pairings = full_outer_join(&actual, &expected, |s| s.to_ascii_lowercase());
        assert_eq!(
            pairings,
            vec![
                Pairing::Both(&"a", &"A"),
                Pairing::Both(&"B", &"b"),
                Pairing::ActualOnly(&"c"),
                Pairing::ExpectedOnly(&"d"),
            ]
        );
    }

    #[test]
    fn test_full_outer_join_pairs_duplicates_once() {
        let pairings = full_outer_join(&[1, 1], &[1], |n| *n);
        assert_eq!(pairings, vec![Pairing::Both(&1, &1), Pairing::ActualOnly(&1)]);
    }

    fn enum_type(values: &[&str]) -> EnumTypeNode {
        EnumTypeNode {
            schema: Ident::from("s"),
            name: Ident::from("mood"),
            values: values.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    #[test]
    fn test_enum_rename_is_case_only() {
        let mut comparator = Comparator::default();
        comparator.enum_values(&enum_type(&["low", "high"]), &enum_type(&["Low", "high"]));
        assert_eq!(
            comparator.changes,
            vec![ModelChange::AlterEnumType {
                schema: Ident::from("s"),
                name: Ident::from("mood"),
                change: EnumValueChange::Rename {
                    from: String::from("low"),
                    to: String::from("Low"),
                },
            }]
        );
    }

    #[test]
    fn test_database_identity_must_match() {
        let actual = DatabaseNode::new("app", "db1");
        let expected = DatabaseNode::new("app", "db2");
        assert_eq!(
            compare(Some(&actual), Some(&expected)),
            Err(SchemaError::DatabaseMismatch {
                actual: String::from("app@db1"),
                expected: String::from("app@db2"),
            })
        );
        assert!(compare(Some(&actual), Some(&DatabaseNode::new("APP", "DB1"))).unwrap().is_empty());
    }

    #[test]
    fn test_missing_sides() {
        assert_eq!(compare(None, None), Err(SchemaError::WrongDatabaseChange));
        let actual = DatabaseNode::new("app", "db");
        assert_eq!(
            compare(Some(&actual), None),
            Err(SchemaError::ImplicitDatabaseDrop(String::from("app@db")))
        );
    }
}
