//! Tree rewrites used when binding lambda parameters.

use crate::error::{Result, TranslationError};

use super::scalar::Parameter;
use super::source::Projection;
use super::IrNode;

type Rewriter<'a> = &'a mut dyn FnMut(&IrNode) -> Option<IrNode>;

/// Rebuilds `node` top-down, replacing every sub-tree for which `f` returns
/// a replacement. Row-producing nodes are opaque: their own parameters were
/// bound when they were built.
pub(crate) fn transform(node: IrNode, f: Rewriter<'_>) -> IrNode {
    if let Some(replacement) = f(&node) {
        return replacement;
    }
    match node {
        IrNode::Binary(mut n) => {
            n.left = boxed(n.left, f);
            n.right = boxed(n.right, f);
            IrNode::Binary(n)
        }
        IrNode::Unary(mut n) => {
            n.operand = boxed(n.operand, f);
            IrNode::Unary(n)
        }
        IrNode::Conditional(mut n) => {
            n.when = boxed(n.when, f);
            n.then = boxed(n.then, f);
            n.otherwise = boxed(n.otherwise, f);
            IrNode::Conditional(n)
        }
        IrNode::MethodCall(mut n) => {
            n.arguments = n
                .arguments
                .into_iter()
                .map(|argument| transform(argument, f))
                .collect();
            IrNode::MethodCall(n)
        }
        IrNode::SimpleBinding(mut n) => {
            n.source = boxed(n.source, f);
            IrNode::SimpleBinding(n)
        }
        IrNode::NamedBinding(mut n) => {
            n.expression = boxed(n.expression, f);
            IrNode::NamedBinding(n)
        }
        other => other,
    }
}

fn boxed(child: Option<Box<IrNode>>, f: Rewriter<'_>) -> Option<Box<IrNode>> {
    child.map(|c| Box::new(transform(*c, f)))
}

/// Replaces references to the parameter `from` with `to`.
pub(crate) fn rename_parameter(node: IrNode, from: &str, to: &Parameter) -> IrNode {
    transform(node, &mut |n| match n {
        IrNode::Parameter(p) if p.name == from => Some(IrNode::Parameter(to.clone())),
        _ => None,
    })
}

/// Replaces members of `parameter` with the expressions `projection`
/// projects under those names. A bare `parameter` is replaced by the value
/// of a single-value projection.
pub(crate) fn inline_bindings(
    node: IrNode,
    parameter: &str,
    projection: &Projection,
) -> Result<IrNode> {
    if projection.bindings.is_empty() {
        return Ok(node);
    }
    let mut missing = None;
    let inlined = transform(node, &mut |n| match n {
        IrNode::SimpleBinding(binding) if binding.owner() == Some(parameter) => {
            let replacement = projection.binding(&binding.name).cloned();
            if replacement.is_none() {
                missing.get_or_insert_with(|| binding.name.clone());
            }
            replacement
        }
        IrNode::Parameter(p) if p.name == parameter => projection.single_value().cloned(),
        _ => None,
    });
    match missing {
        Some(member) => Err(TranslationError::UnknownMember {
            owner: projection.ty.to_string(),
            member,
        }),
        None => Ok(inlined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SqlValue;
    use crate::ir::{ApplyContext, Binary, Constant, NamedBinding, New, QuerySource, SimpleBinding};
    use crate::query::{BinaryOp, QueryType, ScalarType};
    use crate::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};

    static ROWS: EntityDescriptor = EntityDescriptor {
        schema: "s",
        name: "rows",
        columns: &[
            ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
            ColumnDescriptor::new("n", ColumnKind::Scalar(DataType::Integer)),
        ],
        indexes: &[],
    };

    fn rows() -> QueryType {
        QueryType::Entity(&ROWS)
    }

    fn int() -> QueryType {
        QueryType::Scalar(ScalarType::Integer)
    }

    fn member(name: &str, owner: &str) -> IrNode {
        let mut binding = SimpleBinding::new(name, int());
        binding.source = Some(Box::new(IrNode::Parameter(Parameter::new(owner, rows()))));
        IrNode::SimpleBinding(binding)
    }

    fn doubled(name: &str, owner: &str) -> IrNode {
        let mut binary = Binary::new(int(), BinaryOp::Multiply);
        binary.left = Some(Box::new(member(name, owner)));
        binary.right = Some(Box::new(IrNode::Constant(Constant::new(SqlValue::Int(2)))));
        IrNode::Binary(binary)
    }

    fn class_projection() -> Projection {
        let mut context = ApplyContext::new();
        let mut projection = Projection::new(QueryType::Unknown);
        projection
            .apply(IrNode::QuerySource(QuerySource::new(&ROWS)), &mut context)
            .unwrap();
        projection
            .apply(IrNode::New(New::new(QueryType::Unknown, true)), &mut context)
            .unwrap();
        let mut twice = NamedBinding::new("twice", int());
        twice.expression = Some(Box::new(doubled("n", "x")));
        projection.apply(IrNode::NamedBinding(twice), &mut context).unwrap();
        projection
            .apply(IrNode::Parameter(Parameter::new("x", QueryType::Unknown)), &mut context)
            .unwrap();
        projection
    }

    #[test]
    fn test_rename_parameter_reaches_nested_members() {
        let renamed = rename_parameter(doubled("n", "x"), "x", &Parameter::new("a", rows()));
        assert_eq!(renamed, doubled("n", "a"));
    }

    #[test]
    fn test_inline_through_class_projection() {
        let projection = class_projection();
        let inlined = inline_bindings(member("twice", "y"), "y", &projection).unwrap();
        assert_eq!(inlined, doubled("n", "a"));
    }

    #[test]
    fn test_inline_unknown_member_fails() {
        let projection = class_projection();
        let err = inline_bindings(member("thrice", "y"), "y", &projection).unwrap_err();
        assert!(matches!(
            err,
            TranslationError::UnknownMember { member, .. } if member == "thrice"
        ));
    }
}
