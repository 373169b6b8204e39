//! Renders IR into Postgres command text with bound parameters.
//!
//! Keywords are lowercase, identifiers are double-quoted, and every constant
//! or captured value is bound as a positional `@pN` parameter. Sources are
//! aliased `a`, `b`, ... in the order the IR builder named them, so nested
//! queries render as aliased subqueries:
//!
//! ```text
//! select b."id" from (select a."id", a."age" from "app"."users" a where a."age" > @p0) b
//! ```

use tracing::debug;

use crate::command::{CommandBuilder, SqlCommand, SqlValue};
use crate::error::{Result, TranslationError};
use crate::ir::{
    Binary, Conditional, Filter, GroupBy, IrBuilder, IrNode, MethodCall, NamedSource, Parameter,
    Projection, Unary,
};
use crate::query::{BinaryOp, Expr, Lambda, Method, QueryType, UnaryOp};
use crate::schema::quote;

const ATOM: u8 = 9;
const NEGATE: u8 = 7;
const CONCAT: u8 = 5;
const COMPARISON: u8 = 4;
const NOT: u8 = 3;

/// Translates an object query into a select command.
///
/// # Errors
///
/// Fails when the query has no IR counterpart or its root is not a query.
pub fn translate_query(expr: &Expr) -> Result<SqlCommand> {
    let mut builder = IrBuilder::new();
    let root = match builder.build(expr)? {
        source @ IrNode::QuerySource(_) => {
            IrNode::Projection(Projection::all(source, builder.context()))
        }
        root if root.is_query() => root,
        root => {
            return Err(TranslationError::Unsupported(format!(
                "{} at the root of a query",
                root.kind()
            )))
        }
    };
    let command = render(&root)?;
    debug!(sql = %command.text, parameters = command.parameters.len(), "translated query");
    Ok(command)
}

/// Compiles a boolean lambda into a condition over rows aliased `alias`.
///
/// # Errors
///
/// Fails when the lambda body is not a boolean scalar expression.
pub fn translate_predicate(lambda: &Lambda, alias: &str) -> Result<SqlCommand> {
    let node = build_scalar(lambda, alias)?;
    if *node.ty() != QueryType::BOOL {
        return Err(TranslationError::Unsupported(format!(
            "predicate of type {}",
            node.ty()
        )));
    }
    render(&node)
}

/// Compiles a value lambda into an expression over rows aliased `alias`.
///
/// # Errors
///
/// Fails when the lambda body is not a scalar expression.
pub fn translate_expression(lambda: &Lambda, alias: &str) -> Result<SqlCommand> {
    render(&build_scalar(lambda, alias)?)
}

fn build_scalar(lambda: &Lambda, alias: &str) -> Result<IrNode> {
    let alias = Parameter::new(alias, lambda.parameter.ty.clone());
    IrBuilder::new().build_scalar(lambda, &alias)
}

/// Renders a query or scalar IR node.
///
/// # Errors
///
/// Fails on incomplete nodes and on node shapes that have no SQL form.
pub fn render(node: &IrNode) -> Result<SqlCommand> {
    let mut renderer = Renderer::default();
    if node.is_query() {
        renderer.query(node)?;
    } else {
        renderer.scalar(node, 0, false)?;
    }
    Ok(renderer.out.finish())
}

#[derive(Default)]
struct Renderer {
    out: CommandBuilder,
}

impl Renderer {
    fn push(&mut self, text: &str) {
        self.out.push(text);
    }

    fn query(&mut self, node: &IrNode) -> Result<()> {
        match node {
            IrNode::Projection(projection) => self.projection(projection),
            IrNode::Filter(filter) => self.filter(filter),
            IrNode::GroupBy(group) => self.group_by(group),
            IrNode::NamedSource(named) => {
                self.all_columns(&named.ty, named.alias());
                self.push(" from ");
                self.from_item(named)
            }
            IrNode::QuerySource(source) => {
                let columns: Vec<String> = source
                    .entity
                    .stored_columns()
                    .map(|c| quote(c.name))
                    .collect();
                self.push("select ");
                self.push(&columns.join(", "));
                self.push(" from ");
                self.push(&source.entity.qualified_name());
                Ok(())
            }
            other => Err(TranslationError::Unsupported(format!(
                "{} where rows are required",
                other.kind()
            ))),
        }
    }

    fn from_item(&mut self, named: &NamedSource) -> Result<()> {
        match named.source.as_ref() {
            IrNode::QuerySource(source) => self.push(&source.entity.qualified_name()),
            inner => {
                self.push("(");
                self.query(inner)?;
                self.push(")");
            }
        }
        self.push(" ");
        self.push(named.alias());
        Ok(())
    }

    fn named_source<'n>(
        source: Option<&'n IrNode>,
        owner: &'static str,
    ) -> Result<&'n NamedSource> {
        match source {
            Some(IrNode::NamedSource(named)) => Ok(named),
            _ => Err(TranslationError::Incomplete(owner)),
        }
    }

    /// `select a."x", a."y"` for every field of a row type.
    fn all_columns(&mut self, ty: &QueryType, alias: &str) {
        self.push("select ");
        match ty.row_fields() {
            Some(fields) => {
                let columns: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{alias}.{}", quote(field)))
                    .collect();
                self.push(&columns.join(", "));
            }
            None => {
                self.push(alias);
                self.push(".*");
            }
        }
    }

    fn projection(&mut self, projection: &Projection) -> Result<()> {
        let named = Self::named_source(projection.source.as_deref(), "Projection")?;
        if projection.bindings.is_empty() {
            self.all_columns(&named.ty, named.alias());
        } else {
            self.push("select ");
            self.select_list(&projection.bindings)?;
        }
        self.push(" from ");
        self.from_item(named)
    }

    fn filter(&mut self, filter: &Filter) -> Result<()> {
        let expression = filter
            .expression
            .as_deref()
            .ok_or(TranslationError::Incomplete("Filter"))?;
        match filter.source.as_deref() {
            Some(IrNode::Projection(projection)) => self.projection(projection)?,
            source => {
                let named = Self::named_source(source, "Filter")?;
                self.all_columns(&named.ty, named.alias());
                self.push(" from ");
                self.from_item(named)?;
            }
        }
        self.push(" where ");
        self.scalar(expression, 0, false)
    }

    fn group_by(&mut self, group: &GroupBy) -> Result<()> {
        let named = Self::named_source(group.source.as_deref(), "GroupBy")?;
        self.push("select ");
        let selected: Vec<IrNode> = group.keys.iter().chain(&group.values).cloned().collect();
        self.select_list(&selected)?;
        self.push(" from ");
        self.from_item(named)?;
        self.push(" group by ");
        for (i, key) in group.keys.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let key = match key {
                IrNode::NamedBinding(binding) => binding
                    .expression
                    .as_deref()
                    .ok_or(TranslationError::Incomplete("NamedBinding"))?,
                other => other,
            };
            self.scalar(key, 0, false)?;
        }
        Ok(())
    }

    fn select_list(&mut self, bindings: &[IrNode]) -> Result<()> {
        for (i, binding) in bindings.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match binding {
                IrNode::NamedBinding(named) => {
                    let expression = named
                        .expression
                        .as_deref()
                        .ok_or(TranslationError::Incomplete("NamedBinding"))?;
                    self.scalar(expression, 0, false)?;
                    self.push(" as ");
                    self.push(&quote(&named.name));
                }
                other => self.scalar(other, 0, false)?,
            }
        }
        Ok(())
    }

    /// Renders a scalar, parenthesized when it binds looser than its
    /// context (or equally loose where `strict` is set).
    fn scalar(&mut self, node: &IrNode, context: u8, strict: bool) -> Result<()> {
        let own = precedence(node);
        let wrap = own < context || (strict && own == context);
        if wrap {
            self.push("(");
        }
        match node {
            IrNode::Binary(binary) => self.binary(binary)?,
            IrNode::Unary(unary) => self.unary(unary)?,
            IrNode::Conditional(conditional) => self.conditional(conditional)?,
            IrNode::MethodCall(call) => self.method(call)?,
            IrNode::Constant(constant) => {
                self.out.bind(constant.value.clone());
            }
            IrNode::QueryParameter(parameter) => {
                self.out.bind(parameter.value.clone());
            }
            IrNode::SimpleBinding(binding) => {
                let owner = binding
                    .owner()
                    .ok_or(TranslationError::Incomplete("SimpleBinding"))?;
                self.push(&format!("{owner}.{}", quote(&binding.name)));
            }
            IrNode::Parameter(parameter) => self.push(&parameter.name),
            IrNode::NamedBinding(binding) => {
                let expression = binding
                    .expression
                    .as_deref()
                    .ok_or(TranslationError::Incomplete("NamedBinding"))?;
                self.scalar(expression, context, strict)?;
            }
            other => {
                return Err(TranslationError::Unsupported(format!(
                    "{} inside a scalar expression",
                    other.kind()
                )))
            }
        }
        if wrap {
            self.push(")");
        }
        Ok(())
    }

    fn binary(&mut self, binary: &Binary) -> Result<()> {
        let left = child(binary.left.as_deref(), "Binary")?;
        let right = child(binary.right.as_deref(), "Binary")?;
        if matches!(binary.op, BinaryOp::Equal | BinaryOp::NotEqual) {
            let operand = match (is_null(left), is_null(right)) {
                (_, true) => Some(left),
                (true, false) => Some(right),
                (false, false) => None,
            };
            if let Some(operand) = operand {
                self.scalar(operand, COMPARISON, true)?;
                self.push(if binary.op == BinaryOp::Equal {
                    " is null"
                } else {
                    " is not null"
                });
                return Ok(());
            }
        }
        let own = binary.op.precedence();
        self.scalar(left, own, own == COMPARISON)?;
        self.push(" ");
        self.push(binary.op.as_sql());
        self.push(" ");
        self.scalar(right, own, !binary.op.is_associative())
    }

    fn unary(&mut self, unary: &Unary) -> Result<()> {
        let operand = child(unary.operand.as_deref(), "Unary")?;
        match unary.op {
            UnaryOp::Not => {
                self.push("not ");
                self.scalar(operand, NOT, false)
            }
            UnaryOp::Negate => {
                self.push("-");
                self.scalar(operand, NEGATE, true)
            }
        }
    }

    fn conditional(&mut self, conditional: &Conditional) -> Result<()> {
        self.push("case when ");
        self.scalar(child(conditional.when.as_deref(), "Conditional")?, 0, false)?;
        self.push(" then ");
        self.scalar(child(conditional.then.as_deref(), "Conditional")?, 0, false)?;
        self.push(" else ");
        self.scalar(child(conditional.otherwise.as_deref(), "Conditional")?, 0, false)?;
        self.push(" end");
        Ok(())
    }

    fn method(&mut self, call: &MethodCall) -> Result<()> {
        if !call.is_complete() {
            return Err(TranslationError::Incomplete("MethodCall"));
        }
        let args = &call.arguments;
        match call.method {
            Method::Like => {
                self.scalar(&args[0], CONCAT, false)?;
                self.push(" like ");
                self.scalar(&args[1], CONCAT, false)?;
            }
            Method::Contains => {
                self.scalar(&args[0], CONCAT, false)?;
                self.push(" like '%' || ");
                self.scalar(&args[1], CONCAT, false)?;
                self.push(" || '%'");
            }
            Method::StartsWith => {
                self.scalar(&args[0], CONCAT, false)?;
                self.push(" like ");
                self.scalar(&args[1], CONCAT, false)?;
                self.push(" || '%'");
            }
            Method::EndsWith => {
                self.scalar(&args[0], CONCAT, false)?;
                self.push(" like '%' || ");
                self.scalar(&args[1], CONCAT, false)?;
            }
            Method::Count => self.push("count(*)"),
            Method::Lower => self.function("lower", args)?,
            Method::Upper => self.function("upper", args)?,
            Method::Length => self.function("length", args)?,
            Method::Coalesce => self.function("coalesce", args)?,
            Method::Sum => self.function("sum", args)?,
            Method::Min => self.function("min", args)?,
            Method::Max => self.function("max", args)?,
            Method::Avg => self.function("avg", args)?,
            Method::Where | Method::Select | Method::GroupBy => {
                return Err(TranslationError::Unsupported(format!(
                    "{:?} inside a scalar expression",
                    call.method
                )))
            }
        }
        Ok(())
    }

    fn function(&mut self, name: &str, args: &[IrNode]) -> Result<()> {
        self.push(name);
        self.push("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.scalar(arg, 0, false)?;
        }
        self.push(")");
        Ok(())
    }
}

fn child<'n>(node: Option<&'n IrNode>, owner: &'static str) -> Result<&'n IrNode> {
    node.ok_or(TranslationError::Incomplete(owner))
}

fn is_null(node: &IrNode) -> bool {
    match node {
        IrNode::Constant(constant) => constant.value == SqlValue::Null,
        IrNode::QueryParameter(parameter) => parameter.value == SqlValue::Null,
        _ => false,
    }
}

fn precedence(node: &IrNode) -> u8 {
    match node {
        IrNode::Binary(binary) => binary.op.precedence(),
        IrNode::Unary(Unary {
            op: UnaryOp::Not, ..
        }) => NOT,
        IrNode::Unary(_) => NEGATE,
        IrNode::MethodCall(call)
            if matches!(
                call.method,
                Method::Like | Method::Contains | Method::StartsWith | Method::EndsWith
            ) =>
        {
            COMPARISON
        }
        IrNode::NamedBinding(binding) => binding.expression.as_deref().map_or(ATOM, precedence),
        _ => ATOM,
    }
}
