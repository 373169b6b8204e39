//! Atomic structural changes.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{DataType, Ident};

use super::snapshot::{ColumnConstraint, ColumnNode, FunctionNode, IndexNode, TriggerNode, ViewNode};

/// One structural operation on a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelChange {
    CreateDatabase {
        database: Ident,
    },
    CreateSchema {
        schema: Ident,
    },
    CreateEnumType {
        schema: Ident,
        name: Ident,
        values: Vec<String>,
    },
    AlterEnumType {
        schema: Ident,
        name: Ident,
        change: EnumValueChange,
    },
    DropEnumType {
        schema: Ident,
        name: Ident,
    },
    CreateTable {
        schema: Ident,
        table: Ident,
    },
    DropTable {
        schema: Ident,
        table: Ident,
    },
    CreateColumn {
        schema: Ident,
        table: Ident,
        column: ColumnNode,
    },
    AlterColumn {
        schema: Ident,
        table: Ident,
        column: Ident,
        change: ColumnChange,
    },
    DropColumn {
        schema: Ident,
        table: Ident,
        column: Ident,
    },
    CreateView {
        view: ViewNode,
    },
    DropView {
        schema: Ident,
        view: Ident,
    },
    CreateIndex {
        index: IndexNode,
    },
    DropIndex {
        index: IndexNode,
    },
    CreateFunction {
        function: FunctionNode,
    },
    DropFunction {
        schema: Ident,
        function: Ident,
    },
    CreateTrigger {
        trigger: TriggerNode,
    },
    DropTrigger {
        trigger: TriggerNode,
    },
}

/// A change to the labels of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumValueChange {
    Add(String),
    Remove(String),
    /// Same label, different spelling.
    Rename { from: String, to: String },
}

/// A change to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnChange {
    SetDataType(DataType),
    AddConstraint(ColumnConstraint),
    DropConstraint(ColumnConstraint),
}

impl ModelChange {
    /// Returns true for changes that remove something.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        matches!(
            self,
            Self::DropEnumType { .. }
                | Self::DropTable { .. }
                | Self::DropColumn { .. }
                | Self::DropView { .. }
                | Self::DropIndex { .. }
                | Self::DropFunction { .. }
                | Self::DropTrigger { .. }
                | Self::AlterColumn {
                    change: ColumnChange::DropConstraint(_),
                    ..
                }
                | Self::AlterEnumType {
                    change: EnumValueChange::Remove(_),
                    ..
                }
        )
    }
}

impl fmt::Display for ModelChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDatabase { database } => write!(f, "create database {database}"),
            Self::CreateSchema { schema } => write!(f, "create schema {schema}"),
            Self::CreateEnumType { schema, name, .. } => write!(f, "create enum {schema}.{name}"),
            Self::AlterEnumType {
                schema,
                name,
                change,
            } => write!(f, "alter enum {schema}.{name} ({change:?})"),
            Self::DropEnumType { schema, name } => write!(f, "drop enum {schema}.{name}"),
            Self::CreateTable { schema, table } => write!(f, "create table {schema}.{table}"),
            Self::DropTable { schema, table } => write!(f, "drop table {schema}.{table}"),
            Self::CreateColumn {
                schema,
                table,
                column,
            } => write!(f, "create column {schema}.{table}.{}", column.name),
            Self::AlterColumn {
                schema,
                table,
                column,
                change,
            } => write!(f, "alter column {schema}.{table}.{column} ({change:?})"),
            Self::DropColumn {
                schema,
                table,
                column,
            } => write!(f, "drop column {schema}.{table}.{column}"),
            Self::CreateView { view } => write!(f, "create view {}.{}", view.schema, view.name),
            Self::DropView { schema, view } => write!(f, "drop view {schema}.{view}"),
            Self::CreateIndex { index } => {
                write!(f, "create index {}.{}", index.schema, index.name)
            }
            Self::DropIndex { index } => write!(f, "drop index {}.{}", index.schema, index.name),
            Self::CreateFunction { function } => {
                write!(f, "create function {}.{}", function.schema, function.name)
            }
            Self::DropFunction { schema, function } => {
                write!(f, "drop function {schema}.{function}")
            }
            Self::CreateTrigger { trigger } => {
                write!(f, "create trigger {}.{}", trigger.schema, trigger.name)
            }
            Self::DropTrigger { trigger } => {
                write!(f, "drop trigger {}.{}", trigger.schema, trigger.name)
            }
        }
    }
}
