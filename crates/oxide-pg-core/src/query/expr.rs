//! Object query expressions.
//!
//! An [`Expr`] is the typed, backend-neutral description of a query as the
//! caller wrote it. The IR builder walks it to produce the IR.

use crate::command::{SqlValue, ToSqlValue};
use crate::schema::EntityDescriptor;

use super::types::{QueryType, RecordType, ScalarType};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    And,
    Or,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    /// Operator text.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal
            | Self::NotEqual
            | Self::LessThan
            | Self::LessOrEqual
            | Self::GreaterThan
            | Self::GreaterOrEqual => 4,
            Self::Add | Self::Subtract => 5,
            Self::Multiply | Self::Divide | Self::Modulo => 6,
        }
    }

    /// Whether `a op (b op c)` equals `(a op b) op c`.
    #[must_use]
    pub const fn is_associative(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Add | Self::Multiply)
    }

    /// Whether the operator yields a boolean.
    #[must_use]
    pub const fn is_predicate(self) -> bool {
        self.precedence() <= 4
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Methods a query can call: the query operators and scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Where,
    Select,
    GroupBy,
    Like,
    Contains,
    StartsWith,
    EndsWith,
    Lower,
    Upper,
    Length,
    Coalesce,
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Method {
    /// True for operators over sources (`Where`, `Select`, `GroupBy`).
    #[must_use]
    pub const fn is_query_operator(self) -> bool {
        matches!(self, Self::Where | Self::Select | Self::GroupBy)
    }

    /// Number of scalar arguments a scalar method takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Count => 0,
            Self::Lower
            | Self::Upper
            | Self::Length
            | Self::Sum
            | Self::Min
            | Self::Max
            | Self::Avg => 1,
            Self::Like
            | Self::Contains
            | Self::StartsWith
            | Self::EndsWith
            | Self::Coalesce
            | Self::Where
            | Self::Select => 2,
            Self::GroupBy => 3,
        }
    }
}

/// A lambda parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name, unique within its lambda.
    pub name: String,
    /// Type of the values the parameter ranges over.
    pub ty: QueryType,
}

impl Param {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: QueryType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Member access on this parameter; the member type is resolved from
    /// the parameter type.
    #[must_use]
    pub fn field(&self, name: &str) -> Expr {
        Expr::Member {
            ty: self.ty.member(name),
            target: Box::new(Expr::Parameter(self.clone())),
            name: name.to_string(),
        }
    }

    /// The parameter itself as an expression.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Parameter(self.clone())
    }
}

/// A single-parameter lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// The parameter.
    pub parameter: Param,
    /// The body.
    pub body: Expr,
}

impl Lambda {
    /// Builds a lambda over `ty`, passing the fresh parameter to `body`.
    pub fn new(ty: QueryType, body: impl FnOnce(&Param) -> Expr) -> Self {
        let parameter = Param::new("x", ty);
        let body = body(&parameter);
        Self { parameter, body }
    }

    /// Builds a lambda over rows of `entity`.
    pub fn over(entity: &'static EntityDescriptor, body: impl FnOnce(&Param) -> Expr) -> Self {
        Self::new(QueryType::Entity(entity), body)
    }

    /// Returns true if the body is just the parameter.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(&self.body, Expr::Parameter(p) if p.name == self.parameter.name)
    }
}

/// An object query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All rows of an entity table.
    Source(&'static EntityDescriptor),
    /// Reference to a lambda parameter.
    Parameter(Param),
    /// Member access.
    Member {
        /// Accessed value.
        target: Box<Expr>,
        /// Member name.
        name: String,
        /// Member type.
        ty: QueryType,
    },
    /// A literal.
    Constant(SqlValue),
    /// A value captured from the caller's environment.
    Captured {
        /// Name of the captured variable.
        name: String,
        /// Value at capture time.
        value: SqlValue,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `when ? then : otherwise`.
    Conditional {
        /// Condition.
        when: Box<Expr>,
        /// Value when the condition holds.
        then: Box<Expr>,
        /// Value otherwise.
        otherwise: Box<Expr>,
    },
    /// Method call; query operators take their source first.
    Call {
        /// Called method.
        method: Method,
        /// Arguments.
        arguments: Vec<Expr>,
    },
    /// A lambda argument of a query operator.
    Lambda(Box<Lambda>),
    /// Record construction.
    New {
        /// Record type name; `None` for anonymous records.
        name: Option<String>,
        /// Members in declaration order.
        members: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// A literal value.
    pub fn value(value: impl ToSqlValue) -> Self {
        Self::Constant(value.to_sql_value())
    }

    /// A captured variable.
    pub fn captured(name: impl Into<String>, value: impl ToSqlValue) -> Self {
        Self::Captured {
            name: name.into(),
            value: value.to_sql_value(),
        }
    }

    /// A conditional expression.
    pub fn when(condition: Self, then: impl Into<Self>, otherwise: impl Into<Self>) -> Self {
        Self::Conditional {
            when: Box::new(condition),
            then: Box::new(then.into()),
            otherwise: Box::new(otherwise.into()),
        }
    }

    /// A named record.
    pub fn record<N: Into<String>>(
        name: &str,
        members: impl IntoIterator<Item = (N, Self)>,
    ) -> Self {
        Self::New {
            name: Some(name.to_string()),
            members: members.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        }
    }

    /// An anonymous record.
    pub fn anonymous<N: Into<String>>(members: impl IntoIterator<Item = (N, Self)>) -> Self {
        Self::New {
            name: None,
            members: members.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        }
    }

    /// `count(*)`.
    #[must_use]
    pub const fn count() -> Self {
        Self::Call {
            method: Method::Count,
            arguments: Vec::new(),
        }
    }

    fn binary(self, op: BinaryOp, right: impl Into<Self>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    fn call(self, method: Method, rest: Vec<Self>) -> Self {
        let mut arguments = vec![self];
        arguments.extend(rest);
        Self::Call { method, arguments }
    }

    #[must_use]
    pub fn equals(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Equal, other)
    }

    #[must_use]
    pub fn not_equals(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::NotEqual, other)
    }

    #[must_use]
    pub fn less_than(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::LessThan, other)
    }

    #[must_use]
    pub fn less_or_equal(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::LessOrEqual, other)
    }

    #[must_use]
    pub fn greater_than(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::GreaterThan, other)
    }

    #[must_use]
    pub fn greater_or_equal(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::GreaterOrEqual, other)
    }

    #[must_use]
    pub fn and(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    #[must_use]
    pub fn or(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    #[must_use]
    pub fn plus(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    #[must_use]
    pub fn minus(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Subtract, other)
    }

    #[must_use]
    pub fn times(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Multiply, other)
    }

    #[must_use]
    pub fn divided_by(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Divide, other)
    }

    #[must_use]
    pub fn modulo(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Modulo, other)
    }

    /// `self is null`.
    #[must_use]
    pub fn is_null(self) -> Self {
        self.binary(BinaryOp::Equal, SqlValue::Null)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    /// Logical negation.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Self {
        self.call(Method::Like, vec![pattern.into()])
    }

    #[must_use]
    pub fn contains(self, needle: impl Into<Self>) -> Self {
        self.call(Method::Contains, vec![needle.into()])
    }

    #[must_use]
    pub fn starts_with(self, prefix: impl Into<Self>) -> Self {
        self.call(Method::StartsWith, vec![prefix.into()])
    }

    #[must_use]
    pub fn ends_with(self, suffix: impl Into<Self>) -> Self {
        self.call(Method::EndsWith, vec![suffix.into()])
    }

    #[must_use]
    pub fn lower(self) -> Self {
        self.call(Method::Lower, Vec::new())
    }

    #[must_use]
    pub fn upper(self) -> Self {
        self.call(Method::Upper, Vec::new())
    }

    #[must_use]
    pub fn length(self) -> Self {
        self.call(Method::Length, Vec::new())
    }

    #[must_use]
    pub fn coalesce(self, fallback: impl Into<Self>) -> Self {
        self.call(Method::Coalesce, vec![fallback.into()])
    }

    #[must_use]
    pub fn sum(self) -> Self {
        self.call(Method::Sum, Vec::new())
    }

    #[must_use]
    pub fn min(self) -> Self {
        self.call(Method::Min, Vec::new())
    }

    #[must_use]
    pub fn max(self) -> Self {
        self.call(Method::Max, Vec::new())
    }

    #[must_use]
    pub fn avg(self) -> Self {
        self.call(Method::Avg, Vec::new())
    }

    /// Short name of the expression kind, for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::Parameter(_) => "parameter",
            Self::Member { .. } => "member access",
            Self::Constant(_) => "constant",
            Self::Captured { .. } => "captured value",
            Self::Unary { .. } => "unary operation",
            Self::Binary { .. } => "binary operation",
            Self::Conditional { .. } => "conditional",
            Self::Call { .. } => "method call",
            Self::Lambda(_) => "lambda",
            Self::New { .. } => "record construction",
        }
    }

    /// The result type. Query operators report their element type.
    #[must_use]
    pub fn ty(&self) -> QueryType {
        match self {
            Self::Source(entity) => QueryType::Entity(*entity),
            Self::Parameter(p) => p.ty.clone(),
            Self::Member { ty, .. } => ty.clone(),
            Self::Constant(value) | Self::Captured { value, .. } => {
                QueryType::Scalar(ScalarType::of(value))
            }
            Self::Unary { op, operand } => match op {
                UnaryOp::Not => QueryType::BOOL,
                UnaryOp::Negate => operand.ty(),
            },
            Self::Binary { op, left, .. } => {
                if op.is_predicate() {
                    QueryType::BOOL
                } else {
                    left.ty()
                }
            }
            Self::Conditional { then, .. } => then.ty(),
            Self::Call { method, arguments } => call_type(*method, arguments),
            Self::Lambda(lambda) => lambda.body.ty(),
            Self::New { name, members } => QueryType::Record(RecordType {
                name: name.clone(),
                fields: members.iter().map(|(n, e)| (n.clone(), e.ty())).collect(),
            }),
        }
    }
}

fn call_type(method: Method, arguments: &[Expr]) -> QueryType {
    let first = || arguments.first().map_or(QueryType::Unknown, Expr::ty);
    match method {
        Method::Where => first(),
        Method::Select => arguments.get(1).map_or(QueryType::Unknown, Expr::ty),
        Method::GroupBy => {
            let fields = arguments
                .iter()
                .skip(1)
                .flat_map(record_fields)
                .collect();
            QueryType::Record(RecordType { name: None, fields })
        }
        Method::Like | Method::Contains | Method::StartsWith | Method::EndsWith => QueryType::BOOL,
        Method::Lower | Method::Upper => QueryType::Scalar(ScalarType::Text),
        Method::Length | Method::Count => QueryType::Scalar(ScalarType::Integer),
        Method::Avg => QueryType::Scalar(ScalarType::Numeric),
        Method::Coalesce | Method::Sum | Method::Min | Method::Max => first(),
    }
}

/// Fields a selector contributes to a grouping row.
fn record_fields(selector: &Expr) -> Vec<(String, QueryType)> {
    let body = match selector {
        Expr::Lambda(lambda) => &lambda.body,
        other => other,
    };
    match body.ty() {
        QueryType::Record(record) => record.fields,
        ty => {
            let name = match body {
                Expr::Member { name, .. } => name.clone(),
                _ => String::from("key"),
            };
            vec![(name, ty)]
        }
    }
}

impl<T: ToSqlValue> From<T> for Expr {
    fn from(value: T) -> Self {
        Self::Constant(value.to_sql_value())
    }
}

impl From<Lambda> for Expr {
    fn from(lambda: Lambda) -> Self {
        Self::Lambda(Box::new(lambda))
    }
}

/// Fluent builder for query operator chains.
///
/// ```
/// use oxide_pg_core::query::{Expr, Query};
/// # use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
/// # static USERS: EntityDescriptor = EntityDescriptor {
/// #     schema: "app",
/// #     name: "users",
/// #     columns: &[
/// #         ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
/// #         ColumnDescriptor::new("age", ColumnKind::Scalar(DataType::Integer)),
/// #     ],
/// #     indexes: &[],
/// # };
///
/// let query = Query::of(&USERS)
///     .filter(|x| x.field("age").greater_than(18))
///     .select(|x| x.field("id"));
/// let sql = oxide_pg_core::translate::translate_query(query.expr()).unwrap();
/// assert_eq!(
///     sql.text,
///     "select b.\"id\" from (select a.\"id\", a.\"age\" from \"app\".\"users\" a where a.\"age\" > @p0) b"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expr: Expr,
}

impl Query {
    /// Starts a query over all rows of `entity`.
    #[must_use]
    pub const fn of(entity: &'static EntityDescriptor) -> Self {
        Self {
            expr: Expr::Source(entity),
        }
    }

    fn operator(self, method: Method, lambdas: Vec<Lambda>) -> Self {
        let mut arguments = vec![self.expr];
        arguments.extend(lambdas.into_iter().map(Expr::from));
        Self {
            expr: Expr::Call { method, arguments },
        }
    }

    /// Keeps rows matching `predicate`.
    #[must_use]
    pub fn filter(self, predicate: impl FnOnce(&Param) -> Expr) -> Self {
        let lambda = Lambda::new(self.expr.ty(), predicate);
        self.operator(Method::Where, vec![lambda])
    }

    /// Projects each row through `selector`.
    #[must_use]
    pub fn select(self, selector: impl FnOnce(&Param) -> Expr) -> Self {
        let lambda = Lambda::new(self.expr.ty(), selector);
        self.operator(Method::Select, vec![lambda])
    }

    /// Groups rows by `key` and computes `value` aggregates per group.
    #[must_use]
    pub fn group_by(
        self,
        key: impl FnOnce(&Param) -> Expr,
        value: impl FnOnce(&Param) -> Expr,
    ) -> Self {
        let ty = self.expr.ty();
        let key = Lambda::new(ty.clone(), key);
        let value = Lambda::new(ty, value);
        self.operator(Method::GroupBy, vec![key, value])
    }

    /// The underlying expression.
    #[must_use]
    pub const fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Consumes the builder.
    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }
}

impl From<&'static EntityDescriptor> for Query {
    fn from(entity: &'static EntityDescriptor) -> Self {
        Self::of(entity)
    }
}
