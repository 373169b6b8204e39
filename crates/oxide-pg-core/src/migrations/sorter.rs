//! Dependency ordering of model changes.
//!
//! Each change names the objects it creates, drops and depends on. Three
//! rules turn that into a partial order:
//!
//! - a change requiring an object runs after the change creating it;
//! - a removal that still references an object runs before that object is
//!   dropped;
//! - dropping an object runs before creating it again.
//!
//! Independent changes run by phase (drops first, then creates from the
//! database down to triggers) and then in input order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{DataType, Ident};

use super::change::{ColumnChange, EnumValueChange, ModelChange};
use super::snapshot::{ColumnConstraint, ColumnNode};

/// A schema object a change can create, drop or depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectId {
    Database(Ident),
    Schema(Ident),
    EnumType(Ident, Ident),
    Table(Ident, Ident),
    Column(Ident, Ident, Ident),
    View(Ident, Ident),
    Index(Ident, Ident),
    Function(Ident, Ident),
    Trigger(Ident, Ident, Ident),
}

impl ModelChange {
    fn phase(&self) -> u8 {
        match self {
            Self::DropTrigger { .. } => 0,
            Self::DropView { .. } => 1,
            Self::DropIndex { .. } => 2,
            Self::DropFunction { .. } => 3,
            Self::AlterColumn {
                change: ColumnChange::DropConstraint(_),
                ..
            } => 4,
            Self::DropColumn { .. } => 5,
            Self::DropTable { .. } => 6,
            Self::DropEnumType { .. } => 7,
            Self::CreateDatabase { .. } => 8,
            Self::CreateSchema { .. } => 9,
            Self::CreateEnumType { .. } => 10,
            Self::AlterEnumType { .. } => 11,
            Self::CreateTable { .. } => 12,
            Self::CreateColumn { .. } => 13,
            Self::AlterColumn { .. } => 14,
            Self::CreateIndex { .. } => 15,
            Self::CreateView { .. } => 16,
            Self::CreateFunction { .. } => 17,
            Self::CreateTrigger { .. } => 18,
        }
    }

    fn creates(&self) -> Option<ObjectId> {
        Some(match self {
            Self::CreateDatabase { database } => ObjectId::Database(database.clone()),
            Self::CreateSchema { schema } => ObjectId::Schema(schema.clone()),
            Self::CreateEnumType { schema, name, .. } => {
                ObjectId::EnumType(schema.clone(), name.clone())
            }
            Self::CreateTable { schema, table } => ObjectId::Table(schema.clone(), table.clone()),
            Self::CreateColumn {
                schema,
                table,
                column,
            } => ObjectId::Column(schema.clone(), table.clone(), column.name.clone()),
            Self::CreateView { view } => ObjectId::View(view.schema.clone(), view.name.clone()),
            Self::CreateIndex { index } => {
                ObjectId::Index(index.schema.clone(), index.name.clone())
            }
            Self::CreateFunction { function } => {
                ObjectId::Function(function.schema.clone(), function.name.clone())
            }
            Self::CreateTrigger { trigger } => ObjectId::Trigger(
                trigger.schema.clone(),
                trigger.table.clone(),
                trigger.name.clone(),
            ),
            _ => return None,
        })
    }

    fn drops(&self) -> Option<ObjectId> {
        Some(match self {
            Self::DropEnumType { schema, name } => ObjectId::EnumType(schema.clone(), name.clone()),
            Self::DropTable { schema, table } => ObjectId::Table(schema.clone(), table.clone()),
            Self::DropColumn {
                schema,
                table,
                column,
            } => ObjectId::Column(schema.clone(), table.clone(), column.clone()),
            Self::DropView { schema, view } => ObjectId::View(schema.clone(), view.clone()),
            Self::DropIndex { index } => ObjectId::Index(index.schema.clone(), index.name.clone()),
            Self::DropFunction { schema, function } => {
                ObjectId::Function(schema.clone(), function.clone())
            }
            Self::DropTrigger { trigger } => ObjectId::Trigger(
                trigger.schema.clone(),
                trigger.table.clone(),
                trigger.name.clone(),
            ),
            _ => return None,
        })
    }

    /// Objects that must exist while the change runs.
    fn requires(&self) -> Vec<ObjectId> {
        match self {
            Self::CreateEnumType { schema, .. }
            | Self::CreateTable { schema, .. } => vec![ObjectId::Schema(schema.clone())],
            Self::AlterEnumType { schema, name, .. } => {
                vec![ObjectId::EnumType(schema.clone(), name.clone())]
            }
            Self::CreateColumn {
                schema,
                table,
                column,
            } => {
                let mut required = vec![ObjectId::Table(schema.clone(), table.clone())];
                required.extend(column_dependencies(column));
                required
            }
            Self::AlterColumn {
                schema,
                table,
                column,
                change,
            } => {
                let mut required = vec![ObjectId::Column(
                    schema.clone(),
                    table.clone(),
                    column.clone(),
                )];
                match change {
                    ColumnChange::SetDataType(data_type) => required.extend(enum_type(data_type)),
                    ColumnChange::AddConstraint(constraint) => {
                        required.extend(referenced_column(constraint));
                    }
                    ColumnChange::DropConstraint(_) => {}
                }
                required
            }
            Self::CreateView { view } => vec![ObjectId::Schema(view.schema.clone())],
            Self::CreateIndex { index } => {
                let mut required = vec![ObjectId::Table(index.schema.clone(), index.table.clone())];
                required.extend(index.columns.iter().chain(&index.included_columns).map(|c| {
                    ObjectId::Column(index.schema.clone(), index.table.clone(), c.clone())
                }));
                required
            }
            Self::CreateFunction { function } => vec![ObjectId::Schema(function.schema.clone())],
            Self::CreateTrigger { trigger } => vec![
                ObjectId::Table(trigger.schema.clone(), trigger.table.clone()),
                ObjectId::Function(trigger.schema.clone(), trigger.function.clone()),
            ],
            _ => Vec::new(),
        }
    }

    /// Objects a removal still refers to; they are dropped after it.
    fn references(&self) -> Vec<ObjectId> {
        match self {
            Self::DropTrigger { trigger } => vec![
                ObjectId::Function(trigger.schema.clone(), trigger.function.clone()),
                ObjectId::Table(trigger.schema.clone(), trigger.table.clone()),
            ],
            Self::DropIndex { index } => index
                .columns
                .iter()
                .chain(&index.included_columns)
                .map(|c| ObjectId::Column(index.schema.clone(), index.table.clone(), c.clone()))
                .collect(),
            Self::AlterColumn {
                change: ColumnChange::DropConstraint(constraint),
                ..
            } => referenced_column(constraint).into_iter().collect(),
            Self::DropColumn { schema, table, .. } => {
                vec![ObjectId::Table(schema.clone(), table.clone())]
            }
            Self::AlterEnumType {
                schema,
                name,
                change: EnumValueChange::Remove(_),
            } => vec![ObjectId::EnumType(schema.clone(), name.clone())],
            _ => Vec::new(),
        }
    }
}

fn enum_type(data_type: &DataType) -> Option<ObjectId> {
    match data_type {
        DataType::Enum { schema, name } => Some(ObjectId::EnumType(schema.clone(), name.clone())),
        _ => None,
    }
}

fn referenced_column(constraint: &ColumnConstraint) -> Option<ObjectId> {
    match constraint {
        ColumnConstraint::ForeignKey {
            schema,
            table,
            column,
            ..
        } => Some(ObjectId::Column(schema.clone(), table.clone(), column.clone())),
        _ => None,
    }
}

fn column_dependencies(column: &ColumnNode) -> Vec<ObjectId> {
    enum_type(&column.data_type)
        .into_iter()
        .chain(column.constraints.iter().filter_map(referenced_column))
        .collect()
}

/// Orders `changes` so every change runs after the changes it depends on.
///
/// # Errors
///
/// Returns [`SchemaError::DependencyCycle`] naming the changes that depend
/// on each other in a loop.
pub fn sort_changes(changes: Vec<ModelChange>) -> Result<Vec<ModelChange>, SchemaError> {
    let count = changes.len();
    let mut creators: HashMap<ObjectId, usize> = HashMap::new();
    let mut droppers: HashMap<ObjectId, usize> = HashMap::new();
    for (i, change) in changes.iter().enumerate() {
        if let Some(id) = change.creates() {
            creators.entry(id).or_insert(i);
        }
        if let Some(id) = change.drops() {
            droppers.entry(id).or_insert(i);
        }
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree = vec![0_usize; count];
    let mut edge = |from: usize, to: usize| {
        if from != to && !successors[from].contains(&to) {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    };
    for (i, change) in changes.iter().enumerate() {
        for required in change.requires() {
            if let Some(&creator) = creators.get(&required) {
                edge(creator, i);
            }
        }
        if change.is_removal() {
            for referenced in change.references() {
                if let Some(&dropper) = droppers.get(&referenced) {
                    edge(i, dropper);
                }
            }
        }
        if let Some(created) = change.creates() {
            if let Some(&dropper) = droppers.get(&created) {
                edge(dropper, i);
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<(u8, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(i, _)| Reverse((changes[i].phase(), i)))
        .collect();
    let mut order = Vec::with_capacity(count);
    while let Some(Reverse((_, i))) = ready.pop() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((changes[next].phase(), next)));
            }
        }
    }

    if order.len() < count {
        let involved: Vec<String> = (0..count)
            .filter(|i| in_degree[*i] > 0)
            .map(|i| changes[i].to_string())
            .collect();
        return Err(SchemaError::DependencyCycle(involved.join(", ")));
    }
    debug!(changes = count, "sorted model changes");

    let mut slots: Vec<Option<ModelChange>> = changes.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::snapshot::{
        FunctionNode, ReferentialAction, TriggerEvent, TriggerNode, TriggerType,
    };

    fn id(name: &str) -> Ident {
        Ident::from(name)
    }

    fn create_table(table: &str) -> ModelChange {
        ModelChange::CreateTable {
            schema: id("s"),
            table: id(table),
        }
    }

    fn create_column(table: &str, column: ColumnNode) -> ModelChange {
        ModelChange::CreateColumn {
            schema: id("s"),
            table: id(table),
            column,
        }
    }

    fn trigger() -> TriggerNode {
        TriggerNode {
            schema: id("s"),
            name: id("touch"),
            table: id("item"),
            function: id("touch_fn"),
            trigger_type: TriggerType::Before,
            events: [TriggerEvent::Update].into_iter().collect(),
        }
    }

    fn function(definition: &str) -> FunctionNode {
        FunctionNode {
            schema: id("s"),
            name: id("touch_fn"),
            definition: definition.to_string(),
        }
    }

    #[test]
    fn test_creates_follow_their_requirements() {
        let fk = ColumnNode::new("owner", DataType::Bigint).with(ColumnConstraint::ForeignKey {
            schema: id("s"),
            table: id("person"),
            column: id("id"),
            on_delete: ReferentialAction::Restrict,
        });
        let changes = vec![
            create_column("item", fk.clone()),
            create_table("item"),
            create_column("person", ColumnNode::new("id", DataType::Bigint)),
            create_table("person"),
            ModelChange::CreateSchema { schema: id("s") },
        ];
        let sorted = sort_changes(changes).unwrap();
        assert_eq!(
            sorted,
            vec![
                ModelChange::CreateSchema { schema: id("s") },
                create_table("item"),
                create_table("person"),
                create_column("person", ColumnNode::new("id", DataType::Bigint)),
                create_column("item", fk),
            ]
        );
    }

    #[test]
    fn test_drop_and_recreate_order() {
        let changes = vec![
            ModelChange::CreateFunction {
                function: function("new"),
            },
            ModelChange::CreateTrigger { trigger: trigger() },
            ModelChange::DropFunction {
                schema: id("s"),
                function: id("touch_fn"),
            },
            ModelChange::DropTrigger { trigger: trigger() },
        ];
        let kinds: Vec<String> = sort_changes(changes)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "drop trigger s.touch",
                "drop function s.touch_fn",
                "create function s.touch_fn",
                "create trigger s.touch",
            ]
        );
    }

    #[test]
    fn test_ties_keep_input_order_within_phase() {
        let changes = vec![create_table("b"), create_table("a"), create_table("c")];
        assert_eq!(sort_changes(changes.clone()).unwrap(), changes);
    }

    #[test]
    fn test_cycle_is_reported() {
        let a = ColumnNode::new("b_id", DataType::Bigint).with(ColumnConstraint::ForeignKey {
            schema: id("s"),
            table: id("b"),
            column: id("a_id"),
            on_delete: ReferentialAction::Restrict,
        });
        let b = ColumnNode::new("a_id", DataType::Bigint).with(ColumnConstraint::ForeignKey {
            schema: id("s"),
            table: id("a"),
            column: id("b_id"),
            on_delete: ReferentialAction::Restrict,
        });
        let err = sort_changes(vec![create_column("a", a), create_column("b", b)]).unwrap_err();
        let SchemaError::DependencyCycle(involved) = err else {
            panic!("expected a cycle");
        };
        assert!(involved.contains("create column s.a.b_id"));
        assert!(involved.contains("create column s.b.a_id"));
    }
}
