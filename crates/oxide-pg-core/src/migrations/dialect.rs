//! Postgres DDL for model changes.

use crate::schema::{quote, Ident};

use super::change::{ColumnChange, EnumValueChange, ModelChange};
use super::snapshot::{ColumnConstraint, ColumnNode, IndexNode, TriggerNode};

/// Renders [`ModelChange`]s as Postgres statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Statements that apply `change`, in execution order.
    #[must_use]
    pub fn render(&self, change: &ModelChange) -> Vec<String> {
        let statement = match change {
            ModelChange::CreateDatabase { database } => {
                format!("create database {}", database.quoted())
            }
            ModelChange::CreateSchema { schema } => format!("create schema {}", schema.quoted()),
            ModelChange::CreateEnumType {
                schema,
                name,
                values,
            } => {
                let labels: Vec<String> = values.iter().map(|v| literal(v)).collect();
                format!(
                    "create type {} as enum ({})",
                    qualified(schema, name),
                    labels.join(", ")
                )
            }
            ModelChange::AlterEnumType {
                schema,
                name,
                change,
            } => {
                let ty = qualified(schema, name);
                match change {
                    EnumValueChange::Add(value) => {
                        format!("alter type {ty} add value {}", literal(value))
                    }
                    EnumValueChange::Rename { from, to } => format!(
                        "alter type {ty} rename value {} to {}",
                        literal(from),
                        literal(to)
                    ),
                    EnumValueChange::Remove(value) => format!(
                        "delete from pg_enum where enumlabel = {} and enumtypid = {}::regtype",
                        literal(value),
                        literal(&ty)
                    ),
                }
            }
            ModelChange::DropEnumType { schema, name } => {
                format!("drop type {}", qualified(schema, name))
            }
            ModelChange::CreateTable { schema, table } => {
                format!("create table {}()", qualified(schema, table))
            }
            ModelChange::DropTable { schema, table } => {
                format!("drop table {}", qualified(schema, table))
            }
            ModelChange::CreateColumn {
                schema,
                table,
                column,
            } => format!(
                "alter table {} add column {}",
                qualified(schema, table),
                column_definition(column)
            ),
            ModelChange::AlterColumn {
                schema,
                table,
                column,
                change,
            } => format!(
                "alter table {} {}",
                qualified(schema, table),
                alter_column(table, column, change)
            ),
            ModelChange::DropColumn {
                schema,
                table,
                column,
            } => format!(
                "alter table {} drop column {}",
                qualified(schema, table),
                column.quoted()
            ),
            ModelChange::CreateView { view } => format!(
                "create view {} as {}",
                qualified(&view.schema, &view.name),
                view.query
            ),
            ModelChange::DropView { schema, view } => {
                format!("drop view {}", qualified(schema, view))
            }
            ModelChange::CreateIndex { index } => create_index(index),
            ModelChange::DropIndex { index } => {
                format!("drop index {}", qualified(&index.schema, &index.name))
            }
            ModelChange::CreateFunction { function } => format!(
                "create function {}() returns trigger as $$ {} $$ language plpgsql",
                qualified(&function.schema, &function.name),
                function.definition.trim()
            ),
            ModelChange::DropFunction { schema, function } => {
                format!("drop function {}()", qualified(schema, function))
            }
            ModelChange::CreateTrigger { trigger } => create_trigger(trigger),
            ModelChange::DropTrigger { trigger } => format!(
                "drop trigger {} on {}",
                trigger.name.quoted(),
                qualified(&trigger.schema, &trigger.table)
            ),
        };
        vec![statement]
    }

    /// Renders every change in order.
    #[must_use]
    pub fn render_all(&self, changes: &[ModelChange]) -> Vec<String> {
        changes.iter().flat_map(|change| self.render(change)).collect()
    }
}

fn qualified(schema: &Ident, name: &Ident) -> String {
    format!("{}.{}", schema.quoted(), name.quoted())
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quoted_list(names: &[Ident]) -> String {
    names.iter().map(Ident::quoted).collect::<Vec<_>>().join(", ")
}

fn constraint_sql(constraint: &ColumnConstraint) -> String {
    match constraint {
        ColumnConstraint::PrimaryKey => String::from("primary key"),
        ColumnConstraint::NotNull => String::from("not null"),
        ColumnConstraint::Unique => String::from("unique"),
        ColumnConstraint::Default(expr) => format!("default {expr}"),
        ColumnConstraint::ForeignKey {
            schema,
            table,
            column,
            on_delete,
        } => format!(
            "references {} ({}) on delete {}",
            qualified(schema, table),
            column.quoted(),
            on_delete.as_sql()
        ),
    }
}

fn column_definition(column: &ColumnNode) -> String {
    let mut sql = format!("{} {}", column.name.quoted(), column.data_type.to_sql());
    for constraint in &column.constraints {
        sql.push(' ');
        sql.push_str(&constraint_sql(constraint));
    }
    sql
}

/// Name Postgres gives a column constraint declared without one.
fn constraint_name(table: &Ident, column: &Ident, constraint: &ColumnConstraint) -> String {
    let suffix = match constraint {
        ColumnConstraint::PrimaryKey => return quote(&format!("{table}_pkey")),
        ColumnConstraint::Unique => "key",
        _ => "fkey",
    };
    quote(&format!("{table}_{column}_{suffix}"))
}

fn alter_column(table: &Ident, column: &Ident, change: &ColumnChange) -> String {
    let name = column.quoted();
    match change {
        ColumnChange::SetDataType(data_type) => {
            let ty = data_type.to_sql();
            format!("alter column {name} type {ty} using {name}::{ty}")
        }
        ColumnChange::AddConstraint(constraint) => match constraint {
            ColumnConstraint::NotNull => format!("alter column {name} set not null"),
            ColumnConstraint::Default(expr) => format!("alter column {name} set default {expr}"),
            ColumnConstraint::PrimaryKey => format!(
                "add constraint {} primary key ({name})",
                constraint_name(table, column, constraint)
            ),
            ColumnConstraint::Unique => format!(
                "add constraint {} unique ({name})",
                constraint_name(table, column, constraint)
            ),
            ColumnConstraint::ForeignKey { .. } => format!(
                "add constraint {} foreign key ({name}) {}",
                constraint_name(table, column, constraint),
                constraint_sql(constraint)
            ),
        },
        ColumnChange::DropConstraint(constraint) => match constraint {
            ColumnConstraint::NotNull => format!("alter column {name} drop not null"),
            ColumnConstraint::Default(_) => format!("alter column {name} drop default"),
            _ => format!(
                "drop constraint {}",
                constraint_name(table, column, constraint)
            ),
        },
    }
}

fn create_index(index: &IndexNode) -> String {
    let mut sql = format!(
        "create {}index {} on {} ({})",
        if index.unique { "unique " } else { "" },
        index.name.quoted(),
        qualified(&index.schema, &index.table),
        quoted_list(&index.columns)
    );
    if !index.included_columns.is_empty() {
        sql.push_str(&format!(" include ({})", quoted_list(&index.included_columns)));
    }
    if let Some(predicate) = &index.predicate {
        sql.push_str(" where ");
        sql.push_str(predicate);
    }
    sql
}

fn create_trigger(trigger: &TriggerNode) -> String {
    let events: Vec<&str> = trigger.events.iter().map(|e| e.as_sql()).collect();
    format!(
        "create trigger {} {} {} on {} for each row execute function {}()",
        trigger.name.quoted(),
        trigger.trigger_type.as_sql(),
        events.join(" or "),
        qualified(&trigger.schema, &trigger.table),
        qualified(&trigger.schema, &trigger.function)
    )
}
