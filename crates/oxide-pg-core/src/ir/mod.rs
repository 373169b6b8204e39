//! Intermediate representation of object queries.
//!
//! The IR is a closed set of node kinds. Nodes are built bottom-up by
//! [`IrBuilder`], which walks an [`Expr`](crate::query::Expr) and hands each
//! finished child to its parent through [`IrNode::apply`]. Every node kind
//! owns a small slot state machine: the first applied child fills the first
//! slot, the next fills the next, and a child the current slot cannot take
//! is rejected with [`TranslationError::InvalidApply`].

mod builder;
mod rewrite;
mod scalar;
mod source;

pub use builder::IrBuilder;
pub use scalar::{
    Binary, BinarySlot, Conditional, ConditionalSlot, Constant, MethodCall, NamedBinding,
    Parameter, QueryParameter, SimpleBinding, Unary,
};
pub use source::{
    Filter, FilterSlot, GroupBy, GroupBySlot, NamedSource, New, Projection, ProjectionSlot,
    QuerySource,
};

use crate::error::{Result, TranslationError};
use crate::query::QueryType;

/// A node of the query IR.
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    QuerySource(QuerySource),
    NamedSource(NamedSource),
    Filter(Filter),
    Projection(Projection),
    GroupBy(GroupBy),
    New(New),
    Binary(Binary),
    Unary(Unary),
    Conditional(Conditional),
    Constant(Constant),
    MethodCall(MethodCall),
    Parameter(Parameter),
    QueryParameter(QueryParameter),
    SimpleBinding(SimpleBinding),
    NamedBinding(NamedBinding),
}

impl IrNode {
    /// Kind name, used in errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::QuerySource(_) => "QuerySource",
            Self::NamedSource(_) => "NamedSource",
            Self::Filter(_) => "Filter",
            Self::Projection(_) => "Projection",
            Self::GroupBy(_) => "GroupBy",
            Self::New(_) => "New",
            Self::Binary(_) => "Binary",
            Self::Unary(_) => "Unary",
            Self::Conditional(_) => "Conditional",
            Self::Constant(_) => "Constant",
            Self::MethodCall(_) => "MethodCall",
            Self::Parameter(_) => "Parameter",
            Self::QueryParameter(_) => "QueryParameter",
            Self::SimpleBinding(_) => "SimpleBinding",
            Self::NamedBinding(_) => "NamedBinding",
        }
    }

    /// Result type of the node.
    #[must_use]
    pub const fn ty(&self) -> &QueryType {
        match self {
            Self::QuerySource(n) => &n.ty,
            Self::NamedSource(n) => &n.ty,
            Self::Filter(n) => &n.ty,
            Self::Projection(n) => &n.ty,
            Self::GroupBy(n) => &n.ty,
            Self::New(n) => &n.ty,
            Self::Binary(n) => &n.ty,
            Self::Unary(n) => &n.ty,
            Self::Conditional(n) => &n.ty,
            Self::Constant(n) => &n.ty,
            Self::MethodCall(n) => &n.ty,
            Self::Parameter(n) => &n.ty,
            Self::QueryParameter(n) => &n.ty,
            Self::SimpleBinding(n) => &n.ty,
            Self::NamedBinding(n) => &n.ty,
        }
    }

    /// Hands a finished child to this node, advancing its slot state.
    ///
    /// # Errors
    ///
    /// Returns [`TranslationError::InvalidApply`] when the node does not
    /// accept `child` in its current state.
    pub fn apply(&mut self, child: Self, context: &mut ApplyContext) -> Result<()> {
        match self {
            Self::Filter(n) => n.apply(child, context),
            Self::Projection(n) => n.apply(child, context),
            Self::GroupBy(n) => n.apply(child, context),
            Self::Binary(n) => n.apply(child),
            Self::Unary(n) => n.apply(child),
            Self::Conditional(n) => n.apply(child),
            Self::MethodCall(n) => n.apply(child),
            Self::SimpleBinding(n) => n.apply(child),
            Self::NamedBinding(n) => n.apply(child),
            Self::QuerySource(_)
            | Self::NamedSource(_)
            | Self::New(_)
            | Self::Constant(_)
            | Self::Parameter(_)
            | Self::QueryParameter(_) => Err(invalid(self.kind(), &child)),
        }
    }

    /// Whether every required slot is filled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Filter(n) => n.is_complete(),
            Self::Projection(n) => n.is_complete(),
            Self::GroupBy(n) => n.is_complete(),
            Self::Binary(n) => n.slot() == BinarySlot::Complete,
            Self::Unary(n) => n.operand.is_some(),
            Self::Conditional(n) => n.slot() == ConditionalSlot::Complete,
            Self::MethodCall(n) => n.is_complete(),
            Self::SimpleBinding(n) => n.source.is_some(),
            Self::NamedBinding(n) => n.expression.is_some(),
            Self::QuerySource(_)
            | Self::NamedSource(_)
            | Self::New(_)
            | Self::Constant(_)
            | Self::Parameter(_)
            | Self::QueryParameter(_) => true,
        }
    }

    /// Whether the node produces a single value per row.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Binary(_)
                | Self::Unary(_)
                | Self::Conditional(_)
                | Self::Constant(_)
                | Self::MethodCall(_)
                | Self::Parameter(_)
                | Self::QueryParameter(_)
                | Self::SimpleBinding(_)
        )
    }

    /// Whether the node produces rows.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(
            self,
            Self::QuerySource(_)
                | Self::NamedSource(_)
                | Self::Filter(_)
                | Self::Projection(_)
                | Self::GroupBy(_)
        )
    }
}

pub(crate) fn invalid(parent: &'static str, child: &IrNode) -> TranslationError {
    TranslationError::InvalidApply {
        parent,
        child: child.kind(),
    }
}

/// State shared by all nodes of one translation: the alias generator.
///
/// Aliases are handed out as `a`, `b`, ..., `z`, `aa`, `ab`, ... in the
/// order sources get named.
#[derive(Debug, Default)]
pub struct ApplyContext {
    next_alias: usize,
}

impl ApplyContext {
    /// Creates a context whose first alias is `a`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused alias.
    pub fn fresh_alias(&mut self) -> String {
        let mut index = self.next_alias;
        self.next_alias += 1;
        let mut alias = Vec::new();
        loop {
            alias.push(b'a' + u8::try_from(index % 26).unwrap_or(0));
            if index < 26 {
                break;
            }
            index = index / 26 - 1;
        }
        alias.reverse();
        String::from_utf8_lossy(&alias).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SqlValue;
    use crate::query::{BinaryOp, ScalarType};

    fn int(value: i64) -> IrNode {
        IrNode::Constant(Constant::new(SqlValue::Int(value)))
    }

    #[test]
    fn test_alias_sequence() {
        let mut context = ApplyContext::new();
        let aliases: Vec<_> = (0..28).map(|_| context.fresh_alias()).collect();
        assert_eq!(aliases[0], "a");
        assert_eq!(aliases[25], "z");
        assert_eq!(aliases[26], "aa");
        assert_eq!(aliases[27], "ab");
    }

    #[test]
    fn test_binary_fills_left_then_right() {
        let mut context = ApplyContext::new();
        let mut node = IrNode::Binary(Binary::new(QueryType::BOOL, BinaryOp::LessThan));
        assert!(!node.is_complete());
        node.apply(int(1), &mut context).unwrap();
        node.apply(int(2), &mut context).unwrap();
        assert!(node.is_complete());
        let IrNode::Binary(binary) = &node else {
            unreachable!()
        };
        assert_eq!(binary.left.as_deref(), Some(&int(1)));
        assert_eq!(binary.right.as_deref(), Some(&int(2)));
    }

    #[test]
    fn test_apply_to_full_binary_is_rejected() {
        let mut context = ApplyContext::new();
        let mut node = IrNode::Binary(Binary::new(QueryType::BOOL, BinaryOp::Equal));
        node.apply(int(1), &mut context).unwrap();
        node.apply(int(2), &mut context).unwrap();
        let err = node.apply(int(3), &mut context).unwrap_err();
        assert_eq!(
            err,
            TranslationError::InvalidApply {
                parent: "Binary",
                child: "Constant"
            }
        );
    }

    #[test]
    fn test_leaf_rejects_children() {
        let mut context = ApplyContext::new();
        let mut leaf = int(1);
        assert!(leaf.apply(int(2), &mut context).is_err());
    }

    #[test]
    fn test_structural_equality_includes_type() {
        let a = IrNode::Parameter(Parameter::new("a", QueryType::Scalar(ScalarType::Integer)));
        let b = IrNode::Parameter(Parameter::new("a", QueryType::Scalar(ScalarType::Text)));
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
