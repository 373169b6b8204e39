//! Multi-row insert templates.
//!
//! A template fixes the table, column list and conflict clause of an insert;
//! rendering it for a batch only appends one value tuple per row. Templates
//! are cached per `(table, behavior)`.

use std::collections::HashMap;
use std::sync::Arc;

use oxide_pg_core::command::CommandBuilder;
use oxide_pg_core::schema::{quote, DataType, EntityDescriptor, JunctionTable};
use oxide_pg_core::{SqlCommand, SqlValue};
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{OrmError, Result};
use crate::key::TableId;

/// What an insert does when a row conflicts with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertBehavior {
    /// No conflict clause; conflicts fail.
    #[default]
    Default,
    /// `on conflict do nothing`.
    DoNothing,
    /// Upsert on the table's unique key.
    DoUpdate,
}

/// Insert statement prefix and conflict clause for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTemplate {
    table: String,
    columns: Vec<String>,
    /// Type casts for placeholders of enum-typed columns.
    casts: Vec<Option<String>>,
    conflict: String,
}

impl InsertTemplate {
    /// Template for the stored columns of `entity`.
    ///
    /// # Errors
    ///
    /// Fails when the entity has no stored columns.
    pub fn for_entity(entity: &EntityDescriptor, behavior: InsertBehavior) -> Result<Self> {
        let columns: Vec<&str> = entity.stored_columns().map(|c| c.name).collect();
        let key_only = columns.len() == 1 && entity.primary_key().is_some();
        let behavior = if key_only && behavior == InsertBehavior::DoUpdate {
            InsertBehavior::DoNothing
        } else {
            behavior
        };
        let mut template = Self::new(
            entity.qualified_name(),
            &columns,
            behavior,
            &entity.conflict_key(),
        )?;
        template.casts = entity
            .stored_columns()
            .map(|c| c.data_type().filter(DataType::is_enum).map(|ty| ty.to_sql()))
            .collect();
        Ok(template)
    }

    /// Template for a junction table. Existing pairs are left alone.
    ///
    /// # Errors
    ///
    /// Never fails in practice; junction tables always have two columns.
    pub fn for_junction(junction: &JunctionTable) -> Result<Self> {
        Self::new(
            junction.qualified_name(),
            &[JunctionTable::LEFT, JunctionTable::RIGHT],
            InsertBehavior::DoNothing,
            &[],
        )
    }

    fn new(
        table: String,
        columns: &[&str],
        behavior: InsertBehavior,
        key: &[&str],
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(OrmError::NoColumns(table));
        }
        let quoted: Vec<String> = columns.iter().map(|c| quote(c)).collect();
        let conflict = match behavior {
            InsertBehavior::Default => String::new(),
            InsertBehavior::DoNothing => String::from(" on conflict do nothing"),
            InsertBehavior::DoUpdate => {
                let key: Vec<String> = key.iter().map(|c| quote(c)).collect();
                let updates: Vec<String> = quoted
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect();
                format!(
                    " on conflict ({}) do update set {}",
                    key.join(", "),
                    updates.join(", ")
                )
            }
        };
        Ok(Self {
            table,
            casts: vec![None; quoted.len()],
            columns: quoted,
            conflict,
        })
    }

    /// Number of values each row must supply.
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Renders one insert for `rows`, binding every value.
    ///
    /// # Panics
    ///
    /// Panics if a row does not have exactly [`width`](Self::width) values.
    #[must_use]
    pub fn render(&self, rows: &[Vec<SqlValue>]) -> SqlCommand {
        let mut out = CommandBuilder::new();
        out.push("insert into ")
            .push(&self.table)
            .push(" (")
            .push(&self.columns.join(", "))
            .push(") values ");
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), self.width(), "row width mismatch for {}", self.table);
            if i > 0 {
                out.push(", ");
            }
            out.push("(");
            for (j, (value, cast)) in row.iter().zip(&self.casts).enumerate() {
                if j > 0 {
                    out.push(", ");
                }
                out.bind(value.clone());
                if let Some(cast) = cast {
                    out.push("::").push(cast);
                }
            }
            out.push(")");
        }
        out.push(&self.conflict);
        out.finish()
    }
}

/// Cache key: the target table and the conflict behavior.
pub type TemplateKey = (TableId, InsertBehavior);

/// Concurrent cache of insert templates.
///
/// Building a template is idempotent, so a lost race only wastes the
/// losing build.
#[derive(Debug, Default)]
pub struct InsertTemplateCache {
    templates: RwLock<HashMap<TemplateKey, Arc<InsertTemplate>>>,
}

impl InsertTemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached template for `key`, building it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the error of `build`; nothing is cached in that case.
    pub fn get_or_build(
        &self,
        key: TemplateKey,
        build: impl FnOnce() -> Result<InsertTemplate>,
    ) -> Result<Arc<InsertTemplate>> {
        if let Some(template) = self.templates.read().get(&key) {
            return Ok(Arc::clone(template));
        }
        let template = Arc::new(build()?);
        trace!(table = %key.0, behavior = ?key.1, "cached insert template");
        let mut templates = self.templates.write();
        Ok(Arc::clone(templates.entry(key).or_insert(template)))
    }

    /// Number of cached templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}
