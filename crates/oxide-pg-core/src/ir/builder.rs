//! Walks an object query and builds its IR.

use tracing::trace;

use crate::error::{Result, TranslationError};
use crate::query::{Expr, Lambda, Method, QueryType};

use super::rewrite::rename_parameter;
use super::scalar::{
    Binary, Conditional, Constant, MethodCall, NamedBinding, Parameter, QueryParameter,
    SimpleBinding, Unary,
};
use super::source::{Filter, GroupBy, New, Projection, QuerySource};
use super::{ApplyContext, IrNode};

/// Stack-based IR builder.
///
/// Composite expressions push their node, visit their children (each
/// finished child is applied to the node on top of the stack) and pop it
/// again, applying it to the next node down. A lambda contributes its body
/// first and then its parameter, which is what binds the body to the
/// source of the enclosing operator.
#[derive(Debug, Default)]
pub struct IrBuilder {
    stack: Vec<IrNode>,
    root: Option<IrNode>,
    context: ApplyContext,
}

impl IrBuilder {
    /// Creates a builder with a fresh alias sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the IR of a query expression.
    ///
    /// # Errors
    ///
    /// Fails for query shapes the IR cannot express.
    pub fn build(&mut self, expr: &Expr) -> Result<IrNode> {
        self.visit(expr)?;
        self.finish()
    }

    /// Builds the IR of a scalar lambda body, binding its parameter to
    /// `alias`.
    ///
    /// # Errors
    ///
    /// Fails when the body is not a scalar expression.
    pub fn build_scalar(&mut self, lambda: &Lambda, alias: &Parameter) -> Result<IrNode> {
        if lambda.is_identity() {
            return Err(TranslationError::Unsupported(String::from(
                "a row cannot be used as a scalar value",
            )));
        }
        self.visit(&lambda.body)?;
        let root = self.finish()?;
        if !root.is_scalar() {
            return Err(TranslationError::Unsupported(format!(
                "{} where a scalar expression is required",
                root.kind()
            )));
        }
        Ok(rename_parameter(root, &lambda.parameter.name, alias))
    }

    /// The alias generator, for nodes created after building.
    pub fn context(&mut self) -> &mut ApplyContext {
        &mut self.context
    }

    fn finish(&mut self) -> Result<IrNode> {
        if let Some(top) = self.stack.last() {
            return Err(TranslationError::Incomplete(top.kind()));
        }
        self.root
            .take()
            .ok_or_else(|| TranslationError::Unsupported(String::from("empty expression")))
    }

    fn enter(&mut self, node: IrNode) {
        self.stack.push(node);
    }

    fn leave(&mut self) -> Result<()> {
        let node = self
            .stack
            .pop()
            .ok_or_else(|| TranslationError::Unsupported(String::from("unbalanced expression")))?;
        if !node.is_complete() {
            return Err(TranslationError::Incomplete(node.kind()));
        }
        self.emit(node)
    }

    fn emit(&mut self, node: IrNode) -> Result<()> {
        trace!(kind = node.kind(), depth = self.stack.len(), "emit IR node");
        match self.stack.last_mut() {
            Some(parent) => parent.apply(node, &mut self.context),
            None if self.root.is_none() => {
                self.root = Some(node);
                Ok(())
            }
            None => Err(TranslationError::Unsupported(String::from(
                "expression has more than one root",
            ))),
        }
    }

    fn visit(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Source(entity) => self.emit(IrNode::QuerySource(QuerySource::new(entity))),
            Expr::Parameter(p) => {
                self.emit(IrNode::Parameter(Parameter::new(&p.name, p.ty.clone())))
            }
            Expr::Constant(value) => self.emit(IrNode::Constant(Constant::new(value.clone()))),
            Expr::Captured { name, value } => {
                self.emit(IrNode::QueryParameter(QueryParameter::new(name, value.clone())))
            }
            Expr::Member { target, name, ty } => {
                if *ty == QueryType::Unknown {
                    return Err(TranslationError::UnknownMember {
                        owner: target.ty().to_string(),
                        member: name.clone(),
                    });
                }
                if !matches!(**target, Expr::Parameter(_)) {
                    return Err(TranslationError::Unsupported(format!(
                        "member `{name}` accessed through a {}",
                        target.kind()
                    )));
                }
                self.enter(IrNode::SimpleBinding(SimpleBinding::new(name, ty.clone())));
                self.visit(target)?;
                self.leave()
            }
            Expr::Unary { op, operand } => {
                self.enter(IrNode::Unary(Unary::new(expr.ty(), *op)));
                self.visit(operand)?;
                self.leave()
            }
            Expr::Binary { op, left, right } => {
                self.enter(IrNode::Binary(Binary::new(expr.ty(), *op)));
                self.visit(left)?;
                self.visit(right)?;
                self.leave()
            }
            Expr::Conditional {
                when,
                then,
                otherwise,
            } => {
                self.enter(IrNode::Conditional(Conditional::new(expr.ty())));
                self.visit(when)?;
                self.visit(then)?;
                self.visit(otherwise)?;
                self.leave()
            }
            Expr::New { name, members } => {
                self.emit(IrNode::New(New::new(expr.ty(), name.is_none())))?;
                for (member, value) in members {
                    self.enter(IrNode::NamedBinding(NamedBinding::new(member, value.ty())));
                    self.visit(value)?;
                    self.leave()?;
                }
                Ok(())
            }
            Expr::Call { method, arguments } => self.visit_call(expr, *method, arguments),
            Expr::Lambda(_) => Err(TranslationError::Unsupported(String::from(
                "lambda outside of a query operator",
            ))),
        }
    }

    fn visit_call(&mut self, expr: &Expr, method: Method, arguments: &[Expr]) -> Result<()> {
        match (method, arguments) {
            (Method::Where, _) => {
                self.enter(IrNode::Filter(Filter::new(expr.ty())));
                self.visit_filter_chain(expr)?;
                self.leave()
            }
            (Method::Select, [source, Expr::Lambda(selector)]) => {
                self.enter(IrNode::Projection(Projection::new(expr.ty())));
                self.visit(source)?;
                self.visit_lambda(selector)?;
                self.leave()
            }
            (Method::GroupBy, [source, Expr::Lambda(key), rest @ ..]) => {
                self.enter(IrNode::GroupBy(GroupBy::new(expr.ty())));
                self.visit(source)?;
                self.visit_lambda(key)?;
                match rest {
                    [] => {}
                    [Expr::Lambda(value)] => self.visit_lambda(value)?,
                    _ => return Err(malformed(method)),
                }
                self.leave()
            }
            (Method::Select | Method::GroupBy, _) => Err(malformed(method)),
            (_, _) => {
                if arguments.len() != method.arity() {
                    return Err(malformed(method));
                }
                self.enter(IrNode::MethodCall(MethodCall::new(expr.ty(), method)));
                for argument in arguments {
                    self.visit(argument)?;
                }
                self.leave()
            }
        }
    }

    /// Visits a chain of `Where` calls into the filter on top of the stack,
    /// innermost predicate first.
    fn visit_filter_chain(&mut self, expr: &Expr) -> Result<()> {
        let Expr::Call {
            method: Method::Where,
            arguments,
        } = expr
        else {
            return self.visit(expr);
        };
        let [source, Expr::Lambda(predicate)] = arguments.as_slice() else {
            return Err(malformed(Method::Where));
        };
        self.visit_filter_chain(source)?;
        self.visit_lambda(predicate)
    }

    fn visit_lambda(&mut self, lambda: &Lambda) -> Result<()> {
        if !lambda.is_identity() {
            self.visit(&lambda.body)?;
        }
        let parameter = &lambda.parameter;
        self.emit(IrNode::Parameter(Parameter::new(&parameter.name, parameter.ty.clone())))
    }
}

fn malformed(method: Method) -> TranslationError {
    TranslationError::Unsupported(format!("malformed {method:?} call"))
}
