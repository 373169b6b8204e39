//! Schema snapshots, structural diffing and DDL generation.
//!
//! The pipeline runs in four steps:
//!
//! 1. [`CodeModelBuilder`] derives the expected [`DatabaseNode`] from entity
//!    metadata; the live one comes from an introspector.
//! 2. [`compare`] diffs the two snapshots into unordered [`ModelChange`]s.
//! 3. [`sort_changes`] orders them by dependency.
//! 4. [`PostgresDialect`] renders each change as statements.

mod builder;
mod change;
mod dialect;
mod diff;
mod snapshot;
mod sorter;

pub use builder::CodeModelBuilder;
pub use change::{ColumnChange, EnumValueChange, ModelChange};
pub use dialect::PostgresDialect;
pub use diff::{compare, full_outer_join, Pairing};
pub use snapshot::{
    ColumnConstraint, ColumnNode, DatabaseNode, EnumTypeNode, FunctionNode, IndexNode,
    ReferentialAction, SchemaNode, TableNode, TriggerEvent, TriggerNode, TriggerType, ViewNode,
};
pub use sorter::sort_changes;
