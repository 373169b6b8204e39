//! Value-producing IR nodes.

use crate::command::SqlValue;
use crate::error::Result;
use crate::query::{BinaryOp, Method, QueryType, ScalarType, UnaryOp};

use super::{invalid, IrNode};

/// Slot a [`Binary`] fills next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinarySlot {
    Left,
    Right,
    Complete,
}

/// A binary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub ty: QueryType,
    pub op: BinaryOp,
    pub left: Option<Box<IrNode>>,
    pub right: Option<Box<IrNode>>,
}

impl Binary {
    #[must_use]
    pub const fn new(ty: QueryType, op: BinaryOp) -> Self {
        Self {
            ty,
            op,
            left: None,
            right: None,
        }
    }

    /// A complete `left and right`.
    #[must_use]
    pub fn and(left: IrNode, right: IrNode) -> IrNode {
        IrNode::Binary(Self {
            ty: QueryType::BOOL,
            op: BinaryOp::And,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        })
    }

    #[must_use]
    pub const fn slot(&self) -> BinarySlot {
        match (&self.left, &self.right) {
            (None, _) => BinarySlot::Left,
            (Some(_), None) => BinarySlot::Right,
            (Some(_), Some(_)) => BinarySlot::Complete,
        }
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        if !child.is_scalar() {
            return Err(invalid("Binary", &child));
        }
        match self.slot() {
            BinarySlot::Left => self.left = Some(Box::new(child)),
            BinarySlot::Right => self.right = Some(Box::new(child)),
            BinarySlot::Complete => return Err(invalid("Binary", &child)),
        }
        Ok(())
    }
}

/// A unary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub ty: QueryType,
    pub op: UnaryOp,
    pub operand: Option<Box<IrNode>>,
}

impl Unary {
    #[must_use]
    pub const fn new(ty: QueryType, op: UnaryOp) -> Self {
        Self {
            ty,
            op,
            operand: None,
        }
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        if self.operand.is_some() || !child.is_scalar() {
            return Err(invalid("Unary", &child));
        }
        self.operand = Some(Box::new(child));
        Ok(())
    }
}

/// Slot a [`Conditional`] fills next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalSlot {
    When,
    Then,
    Else,
    Complete,
}

/// `case when .. then .. else .. end`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub ty: QueryType,
    pub when: Option<Box<IrNode>>,
    pub then: Option<Box<IrNode>>,
    pub otherwise: Option<Box<IrNode>>,
}

impl Conditional {
    #[must_use]
    pub const fn new(ty: QueryType) -> Self {
        Self {
            ty,
            when: None,
            then: None,
            otherwise: None,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> ConditionalSlot {
        match (&self.when, &self.then, &self.otherwise) {
            (None, _, _) => ConditionalSlot::When,
            (Some(_), None, _) => ConditionalSlot::Then,
            (Some(_), Some(_), None) => ConditionalSlot::Else,
            (Some(_), Some(_), Some(_)) => ConditionalSlot::Complete,
        }
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        if !child.is_scalar() {
            return Err(invalid("Conditional", &child));
        }
        let slot = match self.slot() {
            ConditionalSlot::When => &mut self.when,
            ConditionalSlot::Then => &mut self.then,
            ConditionalSlot::Else => &mut self.otherwise,
            ConditionalSlot::Complete => return Err(invalid("Conditional", &child)),
        };
        *slot = Some(Box::new(child));
        Ok(())
    }
}

/// A literal, always sent as a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: QueryType,
    pub value: SqlValue,
}

impl Constant {
    #[must_use]
    pub fn new(value: SqlValue) -> Self {
        Self {
            ty: QueryType::Scalar(ScalarType::of(&value)),
            value,
        }
    }
}

/// A value captured from the caller's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub ty: QueryType,
    pub name: String,
    pub value: SqlValue,
}

impl QueryParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            ty: QueryType::Scalar(ScalarType::of(&value)),
            name: name.into(),
            value,
        }
    }
}

/// A scalar function or aggregate call.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub ty: QueryType,
    pub method: Method,
    pub arguments: Vec<IrNode>,
}

impl MethodCall {
    #[must_use]
    pub const fn new(ty: QueryType, method: Method) -> Self {
        Self {
            ty,
            method,
            arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.arguments.len() == self.method.arity()
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        if self.is_complete() || !child.is_scalar() {
            return Err(invalid("MethodCall", &child));
        }
        self.arguments.push(child);
        Ok(())
    }
}

/// A lambda parameter or a named source alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub ty: QueryType,
    pub name: String,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: QueryType) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }
}

/// Member access on a parameter: `a."column"`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleBinding {
    pub ty: QueryType,
    pub name: String,
    pub source: Option<Box<IrNode>>,
}

impl SimpleBinding {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: QueryType) -> Self {
        Self {
            ty,
            name: name.into(),
            source: None,
        }
    }

    /// Name of the parameter the member is read from.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        match self.source.as_deref() {
            Some(IrNode::Parameter(parameter)) => Some(&parameter.name),
            _ => None,
        }
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        match child {
            IrNode::Parameter(_) if self.source.is_none() => {
                self.source = Some(Box::new(child));
                Ok(())
            }
            other => Err(invalid("SimpleBinding", &other)),
        }
    }
}

/// A projected member with an explicit name: `expr as "name"`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedBinding {
    pub ty: QueryType,
    pub name: String,
    pub expression: Option<Box<IrNode>>,
}

impl NamedBinding {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: QueryType) -> Self {
        Self {
            ty,
            name: name.into(),
            expression: None,
        }
    }

    pub(crate) fn apply(&mut self, child: IrNode) -> Result<()> {
        if self.expression.is_some() || !child.is_scalar() {
            return Err(invalid("NamedBinding", &child));
        }
        self.expression = Some(Box::new(child));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> IrNode {
        IrNode::Constant(Constant::new(SqlValue::Text(value.to_string())))
    }

    #[test]
    fn test_conditional_slot_order() {
        let mut node = Conditional::new(QueryType::Scalar(ScalarType::Text));
        assert_eq!(node.slot(), ConditionalSlot::When);
        node.apply(IrNode::Constant(Constant::new(SqlValue::Bool(true))))
            .unwrap();
        assert_eq!(node.slot(), ConditionalSlot::Then);
        node.apply(text("yes")).unwrap();
        assert_eq!(node.slot(), ConditionalSlot::Else);
        node.apply(text("no")).unwrap();
        assert_eq!(node.slot(), ConditionalSlot::Complete);
        assert_eq!(node.otherwise.as_deref(), Some(&text("no")));
        assert!(node.apply(text("extra")).is_err());
    }

    #[test]
    fn test_method_call_respects_arity() {
        let mut call = MethodCall::new(QueryType::BOOL, Method::Like);
        call.apply(text("a")).unwrap();
        assert!(!call.is_complete());
        call.apply(text("b")).unwrap();
        assert!(call.is_complete());
        assert!(call.apply(text("c")).is_err());
    }

    #[test]
    fn test_simple_binding_takes_only_parameter() {
        let mut binding = SimpleBinding::new("name", QueryType::Scalar(ScalarType::Text));
        assert!(binding.apply(text("x")).is_err());
        binding
            .apply(IrNode::Parameter(Parameter::new("a", QueryType::Unknown)))
            .unwrap();
        assert_eq!(binding.owner(), Some("a"));
    }

    #[test]
    fn test_named_binding_rejects_sources() {
        let mut binding = NamedBinding::new("n", QueryType::Unknown);
        let source = IrNode::QuerySource(super::super::QuerySource::new(&NOTHING));
        assert!(binding.apply(source).is_err());
    }

    static NOTHING: crate::schema::EntityDescriptor = crate::schema::EntityDescriptor {
        schema: "s",
        name: "t",
        columns: &[],
        indexes: &[],
    };
}
