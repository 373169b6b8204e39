//! The persistence repository.
//!
//! Inserts persist whole entity graphs in dependency order. Updates and
//! deletes are addressed by entity type and a predicate; both capture the
//! version distribution of the matching rows first so that every prior
//! version they overwrite ends up in the transaction's change log.

use std::sync::Arc;

use oxide_pg_core::command::CommandBuilder;
use oxide_pg_core::query::{Expr, Lambda, Param};
use oxide_pg_core::schema::{quote, ColumnKind, EntityDescriptor};
use oxide_pg_core::translate::{translate_expression, translate_predicate};
use oxide_pg_core::{SqlCommand, SqlValue, ToSqlValue, TranslationError};
use tracing::{debug, info};

use crate::entity::{EntityRef, EntityType, Relation};
use crate::error::{OrmError, Result};
use crate::flatten::{flatten, FlatRow};
use crate::key::{EntityKey, TableId};
use crate::ordering::{order_rows, InsertPlan};
use crate::template::{InsertBehavior, InsertTemplate, InsertTemplateCache};
use crate::transaction::{DatabaseTransaction, QueryRow, TransactionalChange};

/// Table alias used by update and delete commands.
const ALIAS: &str = "t";

/// One `set column = value` of an update.
#[derive(Debug, Clone)]
pub struct Assignment {
    accessor: Lambda,
    value: Lambda,
}

impl Assignment {
    /// Assigns the value computed by `value` to the column selected by
    /// `accessor`. Both closures range over rows of `E`.
    pub fn new<E: EntityType>(
        accessor: impl FnOnce(&Param) -> Expr,
        value: impl FnOnce(&Param) -> Expr,
    ) -> Self {
        Self {
            accessor: Lambda::over(E::DESCRIPTOR, accessor),
            value: Lambda::over(E::DESCRIPTOR, value),
        }
    }

    /// Assigns a constant to `column`.
    pub fn set<E: EntityType>(column: &str, value: impl ToSqlValue) -> Self {
        let value = Expr::value(value);
        Self::new::<E>(|row| row.field(column), move |_| value)
    }

    /// Resolves the accessor to a stored column of `entity`.
    fn column(&self, entity: &'static EntityDescriptor) -> Result<&'static str> {
        let invalid = || TranslationError::InvalidAccessor(format!("{:?}", self.accessor.body));
        let Expr::Member { target, name, .. } = &self.accessor.body else {
            return Err(invalid().into());
        };
        if !matches!(&**target, Expr::Parameter(p) if p.name == self.accessor.parameter.name) {
            return Err(invalid().into());
        }
        let column = entity.column(name).ok_or_else(|| TranslationError::UnknownMember {
            owner: entity.to_string(),
            member: name.clone(),
        })?;
        match column.kind {
            ColumnKind::Collection(_) => Err(OrmError::CollectionUpdate {
                entity: entity.to_string(),
                column: column.name.to_string(),
            }),
            ColumnKind::Version | ColumnKind::PrimaryKey(_) => Err(invalid().into()),
            _ => Ok(column.name),
        }
    }
}

/// Persists entities through a [`DatabaseTransaction`].
///
/// The insert template cache is shared between clones.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    templates: Arc<InsertTemplateCache>,
}

impl Repository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository sharing `templates`.
    #[must_use]
    pub const fn with_cache(templates: Arc<InsertTemplateCache>) -> Self {
        Self { templates }
    }

    #[must_use]
    pub fn templates(&self) -> &Arc<InsertTemplateCache> {
        &self.templates
    }

    /// Inserts `entities` and everything reachable from them.
    ///
    /// Unstamped entities receive the current transaction id as version.
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Fails when required relations form a cycle, when a table has no
    /// columns, and when the backend rejects a command.
    pub async fn insert<T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        entities: &[EntityRef],
        behavior: InsertBehavior,
    ) -> Result<u64> {
        let rows = flatten(entities);
        if rows.is_empty() {
            return Ok(0);
        }

        let created: Vec<EntityKey> = rows
            .iter()
            .filter_map(|row| match row {
                FlatRow::Entity(entity) => Some(entity.entity_key()),
                FlatRow::Junction(_) => None,
            })
            .collect();

        let plan = order_rows(rows)?;
        let version = tx.transaction_id().await?;
        for row in &plan.rows {
            if let FlatRow::Entity(entity) = row {
                if entity.version() == 0 {
                    entity.set_version(version);
                }
            }
        }

        let mut affected = 0;
        let mut start = 0;
        while start < plan.rows.len() {
            let table = plan.rows[start].table_id();
            let end = plan.rows[start..]
                .iter()
                .position(|row| row.table_id() != table)
                .map_or(plan.rows.len(), |n| start + n);
            let batch = &plan.rows[start..end];
            start = end;

            let template = match &batch[0] {
                FlatRow::Entity(entity) => {
                    let descriptor = entity.descriptor();
                    self.templates.get_or_build((table, behavior), || {
                        InsertTemplate::for_entity(descriptor, behavior)
                    })?
                }
                FlatRow::Junction(junction) => self
                    .templates
                    .get_or_build((table, InsertBehavior::DoNothing), || {
                        InsertTemplate::for_junction(&junction.table)
                    })?,
            };
            let values: Vec<Vec<SqlValue>> =
                batch.iter().map(|row| row_values(row, &plan)).collect();
            let command = template.render(&values);
            debug!(rows = batch.len(), sql = %command.text, "inserting batch");
            affected += execute(tx, &command).await?;
        }

        for deferred in &plan.deferred {
            let descriptor = deferred.entity.descriptor();
            let key = descriptor
                .primary_key()
                .ok_or_else(|| OrmError::MissingKey(descriptor.to_string()))?;
            let mut out = CommandBuilder::new();
            out.push("update ")
                .push(&descriptor.qualified_name())
                .push(" set ")
                .push(&quote(deferred.column))
                .push(" = ")
                .bind(deferred.target.key())
                .push(" where ")
                .push(&quote(key.name))
                .push(" = ")
                .bind(deferred.entity.key());
            execute(tx, &out.finish()).await?;
        }

        info!(entities = created.len(), affected, version, "inserted entities");
        tx.record(TransactionalChange::EntitiesCreated {
            entities: created,
            version,
        });
        Ok(affected)
    }

    /// Applies `assignments` to every row of `E` matching `predicate` and
    /// stamps those rows with the current transaction id.
    ///
    /// # Errors
    ///
    /// Fails for accessors that do not name exactly one stored column, for
    /// entity types without a version column, on translation errors, and
    /// when the backend rejects a command.
    pub async fn update<E: EntityType, T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        assignments: &[Assignment],
        predicate: impl FnOnce(&Param) -> Expr,
    ) -> Result<u64> {
        let entity = E::DESCRIPTOR;
        let version_column = version_column(entity)?;

        let mut command =
            SqlCommand::new(format!("update {} {ALIAS} set ", entity.qualified_name()));
        for (i, assignment) in assignments.iter().enumerate() {
            let column = assignment.column(entity)?;
            let mut value = translate_expression(&assignment.value, ALIAS)?;
            if let Some(ty) = entity.column(column).and_then(|c| c.data_type()) {
                if ty.is_enum() {
                    value.text = format!("({})::{}", value.text, ty.to_sql());
                }
            }
            let separator = if i == 0 { "" } else { ", " };
            command = command.merge(value, &format!("{separator}{} = ", quote(column)));
        }

        let filter = translate_predicate(&Lambda::over(entity, predicate), ALIAS)?;
        let versions = capture_versions(tx, entity, version_column, &filter).await?;
        let new_version = tx.transaction_id().await?;

        let mut stamp = CommandBuilder::new();
        stamp.bind(SqlValue::Int(new_version));
        let separator = if assignments.is_empty() { "" } else { ", " };
        let command = command
            .merge(stamp.finish(), &format!("{separator}{} = ", quote(version_column)))
            .merge(filter, " where ");

        let affected = execute(tx, &command).await?;
        info!(entity = %entity, affected, new_version, "updated entities");
        for (version, rows) in versions {
            tx.record(TransactionalChange::EntitiesUpdated {
                table: TableId::new(entity.qualified_name()),
                version,
                rows,
                new_version,
                command: command.text.clone(),
            });
        }
        Ok(affected)
    }

    /// Deletes every row of `E` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Fails for entity types without a version column, on translation
    /// errors, and when the backend rejects a command.
    pub async fn delete<E: EntityType, T: DatabaseTransaction>(
        &self,
        tx: &mut T,
        predicate: impl FnOnce(&Param) -> Expr,
    ) -> Result<u64> {
        let entity = E::DESCRIPTOR;
        let version_column = version_column(entity)?;

        let filter = translate_predicate(&Lambda::over(entity, predicate), ALIAS)?;
        let versions = capture_versions(tx, entity, version_column, &filter).await?;
        let command = SqlCommand::new(format!("delete from {} {ALIAS}", entity.qualified_name()))
            .merge(filter, " where ");

        let affected = execute(tx, &command).await?;
        info!(entity = %entity, affected, "deleted entities");
        for (version, rows) in versions {
            tx.record(TransactionalChange::EntitiesDeleted {
                table: TableId::new(entity.qualified_name()),
                version,
                rows,
                command: command.text.clone(),
            });
        }
        Ok(affected)
    }
}

fn version_column(entity: &EntityDescriptor) -> Result<&'static str> {
    entity
        .version_column()
        .map(|c| c.name)
        .ok_or_else(|| OrmError::MissingVersion(entity.to_string()))
}

/// Values of one flattened row in template column order.
fn row_values(row: &FlatRow, plan: &InsertPlan) -> Vec<SqlValue> {
    let entity = match row {
        FlatRow::Junction(junction) => return vec![junction.left.clone(), junction.right.clone()],
        FlatRow::Entity(entity) => entity,
    };
    let key = entity.entity_key();
    entity
        .descriptor()
        .stored_columns()
        .map(|column| match column.kind {
            ColumnKind::PrimaryKey(_) => entity.key(),
            ColumnKind::Version => SqlValue::Int(entity.version()),
            ColumnKind::Reference(_) if plan.is_deferred(&key, column.name) => SqlValue::Null,
            ColumnKind::Reference(_) => match entity.relation(column.name) {
                Relation::One(Some(target)) => target.key(),
                _ => SqlValue::Null,
            },
            _ => entity.value(column.name).unwrap_or(SqlValue::Null),
        })
        .collect()
}

/// Row counts per version of the rows matching `filter`.
async fn capture_versions<T: DatabaseTransaction>(
    tx: &mut T,
    entity: &EntityDescriptor,
    version_column: &str,
    filter: &SqlCommand,
) -> Result<Vec<(i64, u64)>> {
    let version = format!("{ALIAS}.{}", quote(version_column));
    let command = SqlCommand::new(format!(
        "select {version}, count(*) from {} {ALIAS}",
        entity.qualified_name()
    ))
    .merge(filter.clone(), " where ")
    .merge(SqlCommand::new(format!("group by {version}")), " ");

    debug!(sql = %command.text, "capturing row versions");
    let rows = tx
        .query(&command)
        .await
        .map_err(|e| OrmError::classify(&command, e))?;
    Ok(rows.iter().filter_map(version_count).collect())
}

fn version_count(row: &QueryRow) -> Option<(i64, u64)> {
    let version = row.int_at(0)?;
    let count = u64::try_from(row.int_at(1)?).ok()?;
    Some((version, count))
}

async fn execute<T: DatabaseTransaction>(tx: &mut T, command: &SqlCommand) -> Result<u64> {
    debug!(sql = %command.text, parameters = command.parameters.len(), "executing");
    tx.execute(command)
        .await
        .map_err(|e| OrmError::classify(command, e))
}
