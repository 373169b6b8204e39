//! Entity graph flattening.
//!
//! Walks the object graph reachable from the inserted roots and lists every
//! entity once, followed at the point of discovery by the junction rows of
//! its collection relations.

use std::collections::HashSet;

use oxide_pg_core::schema::{ColumnKind, JunctionTable};
use oxide_pg_core::SqlValue;

use crate::entity::{EntityRef, Relation};
use crate::key::{EntityKey, TableId};

/// A pairing of an owner and one member of its collection relation.
#[derive(Debug, Clone)]
pub struct JunctionRow {
    pub table: JunctionTable,
    /// Owner primary key.
    pub left: SqlValue,
    /// Member primary key.
    pub right: SqlValue,
}

impl JunctionRow {
    #[must_use]
    pub fn table_id(&self) -> TableId {
        TableId::new(self.table.qualified_name())
    }

    /// Identity of the row the `left` column points to.
    #[must_use]
    pub fn owner_key(&self) -> EntityKey {
        EntityKey::new(TableId::new(self.table.owner.qualified_name()), &self.left)
    }

    /// Identity of the row the `right` column points to.
    #[must_use]
    pub fn member_key(&self) -> EntityKey {
        EntityKey::new(TableId::new(self.table.target.qualified_name()), &self.right)
    }
}

/// One row to insert.
#[derive(Debug, Clone)]
pub enum FlatRow {
    Entity(EntityRef),
    Junction(JunctionRow),
}

impl FlatRow {
    #[must_use]
    pub fn table_id(&self) -> TableId {
        match self {
            Self::Entity(entity) => entity.entity_key().table,
            Self::Junction(junction) => junction.table_id(),
        }
    }
}

/// Flattens the graphs reachable from `roots` in depth-first pre-order.
///
/// An entity is marked visited before its relations are expanded, so self
/// and mutual references terminate.
#[must_use]
pub fn flatten(roots: &[EntityRef]) -> Vec<FlatRow> {
    let mut visited = HashSet::new();
    let mut rows = Vec::new();
    let mut pending: Vec<EntityRef> = roots.iter().rev().cloned().collect();

    while let Some(entity) = pending.pop() {
        if !visited.insert(entity.entity_key()) {
            continue;
        }
        rows.push(FlatRow::Entity(entity.clone()));

        let descriptor = entity.descriptor();
        let mut children = Vec::new();
        for column in descriptor.columns {
            match (&column.kind, entity.relation(column.name)) {
                (ColumnKind::Reference(_), Relation::One(Some(target))) => children.push(target),
                (ColumnKind::Collection(target_type), Relation::Many(members)) => {
                    let table = JunctionTable {
                        owner: descriptor,
                        column,
                        target: target_type(),
                    };
                    for member in members {
                        rows.push(FlatRow::Junction(JunctionRow {
                            table,
                            left: entity.key(),
                            right: member.key(),
                        }));
                        children.push(member);
                    }
                }
                _ => {}
            }
        }
        pending.extend(children.into_iter().rev());
    }
    rows
}
