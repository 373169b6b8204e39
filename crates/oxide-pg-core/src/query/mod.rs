//! Typed object queries over entity tables.

mod expr;
mod types;

pub use expr::{BinaryOp, Expr, Lambda, Method, Param, Query, UnaryOp};
pub use types::{QueryType, RecordType, ScalarType};
