//! Row-producing IR nodes.

use crate::error::{Result, TranslationError};
use crate::query::QueryType;
use crate::schema::EntityDescriptor;

use super::rewrite::{inline_bindings, rename_parameter};
use super::scalar::{Binary, Parameter};
use super::{invalid, ApplyContext, IrNode};

/// All rows of an entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySource {
    pub ty: QueryType,
    pub entity: &'static EntityDescriptor,
}

impl QuerySource {
    #[must_use]
    pub const fn new(entity: &'static EntityDescriptor) -> Self {
        Self {
            ty: QueryType::Entity(entity),
            entity,
        }
    }
}

/// A source bound to an alias.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSource {
    pub ty: QueryType,
    pub source: Box<IrNode>,
    pub parameter: Parameter,
}

impl NamedSource {
    /// Binds `source` to a fresh alias.
    #[must_use]
    pub fn new(source: IrNode, context: &mut ApplyContext) -> Self {
        let ty = source.ty().clone();
        let parameter = Parameter::new(context.fresh_alias(), ty.clone());
        Self {
            ty,
            source: Box::new(source),
            parameter,
        }
    }

    /// The alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.parameter.name
    }
}

/// Ensures `source` is named, returning it together with its alias.
fn named(source: IrNode, context: &mut ApplyContext) -> (IrNode, Parameter) {
    match source {
        IrNode::NamedSource(named) => {
            let alias = named.parameter.clone();
            (IrNode::NamedSource(named), alias)
        }
        other => {
            let named = NamedSource::new(other, context);
            let alias = named.parameter.clone();
            (IrNode::NamedSource(named), alias)
        }
    }
}

/// Marker for record construction in a projection.
#[derive(Debug, Clone, PartialEq)]
pub struct New {
    pub ty: QueryType,
    pub anonymous: bool,
}

impl New {
    #[must_use]
    pub const fn new(ty: QueryType, anonymous: bool) -> Self {
        Self { ty, anonymous }
    }
}

/// Slot a [`Filter`] fills next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSlot {
    Source,
    Predicate,
}

/// Rows of a source that satisfy a predicate.
///
/// Predicate parts accumulate until the lambda's parameter is applied; the
/// parameter then binds them to the source's alias and ANDs them onto the
/// expression. Consecutive filters share one node this way.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub ty: QueryType,
    pub source: Option<Box<IrNode>>,
    pub expression: Option<Box<IrNode>>,
    pending: Option<Box<IrNode>>,
}

impl Filter {
    #[must_use]
    pub const fn new(ty: QueryType) -> Self {
        Self {
            ty,
            source: None,
            expression: None,
            pending: None,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> FilterSlot {
        if self.source.is_none() {
            FilterSlot::Source
        } else {
            FilterSlot::Predicate
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.source.is_some() && self.expression.is_some() && self.pending.is_none()
    }

    pub(crate) fn apply(&mut self, child: IrNode, context: &mut ApplyContext) -> Result<()> {
        match (self.slot(), child) {
            (FilterSlot::Source, child @ (IrNode::Projection(_) | IrNode::QuerySource(_))) => {
                self.source = Some(Box::new(child));
                Ok(())
            }
            (FilterSlot::Predicate, IrNode::Parameter(parameter)) => self.bind(&parameter, context),
            (FilterSlot::Predicate, child) if child.is_scalar() => {
                let part = match self.pending.take() {
                    Some(existing) => Binary::and(*existing, child),
                    None => child,
                };
                self.pending = Some(Box::new(part));
                Ok(())
            }
            (_, child) => Err(invalid("Filter", &child)),
        }
    }

    fn bind(&mut self, parameter: &Parameter, context: &mut ApplyContext) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or(TranslationError::Incomplete("Filter predicate"))?;
        let source = self
            .source
            .take()
            .ok_or(TranslationError::Incomplete("Filter source"))?;

        let (source, predicate) = match *source {
            IrNode::Projection(mut projection) => {
                let alias = projection.ensure_named(context)?;
                let inlined = inline_bindings(*pending, &parameter.name, &projection)?;
                let predicate = rename_parameter(inlined, &parameter.name, &alias);
                (IrNode::Projection(projection), predicate)
            }
            source => {
                let (source, alias) = named(source, context);
                (source, rename_parameter(*pending, &parameter.name, &alias))
            }
        };

        self.source = Some(Box::new(source));
        let expression = match self.expression.take() {
            Some(existing) => Binary::and(*existing, predicate),
            None => predicate,
        };
        self.expression = Some(Box::new(expression));
        Ok(())
    }

    /// Alias the predicate refers to.
    #[must_use]
    pub fn alias(&self) -> Option<&Parameter> {
        match self.source.as_deref()? {
            IrNode::NamedSource(named) => Some(&named.parameter),
            IrNode::Projection(projection) => projection.alias(),
            _ => None,
        }
    }
}

/// Slot a [`Projection`] fills next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSlot {
    Source,
    Bindings,
    Complete,
}

/// A projection of each row of a source.
///
/// Without bindings the projection selects every field of the element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub ty: QueryType,
    pub source: Option<Box<IrNode>>,
    pub bindings: Vec<IrNode>,
    pub is_projection_to_class: bool,
    pub is_anonymous: bool,
    bound: bool,
}

impl Projection {
    #[must_use]
    pub const fn new(ty: QueryType) -> Self {
        Self {
            ty,
            source: None,
            bindings: Vec::new(),
            is_projection_to_class: false,
            is_anonymous: false,
            bound: false,
        }
    }

    /// A complete projection of every field of `source`.
    #[must_use]
    pub fn all(source: IrNode, context: &mut ApplyContext) -> Self {
        let ty = source.ty().clone();
        let (source, _) = named(source, context);
        Self {
            ty,
            source: Some(Box::new(source)),
            bindings: Vec::new(),
            is_projection_to_class: false,
            is_anonymous: false,
            bound: true,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> ProjectionSlot {
        match (&self.source, self.bound) {
            (None, _) => ProjectionSlot::Source,
            (Some(_), false) => ProjectionSlot::Bindings,
            (Some(_), true) => ProjectionSlot::Complete,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.slot(), ProjectionSlot::Complete)
    }

    pub(crate) fn apply(&mut self, child: IrNode, context: &mut ApplyContext) -> Result<()> {
        match (self.slot(), child) {
            (
                ProjectionSlot::Source,
                child @ (IrNode::Projection(_)
                | IrNode::Filter(_)
                | IrNode::QuerySource(_)
                | IrNode::NamedSource(_)
                | IrNode::GroupBy(_)),
            ) => {
                self.source = Some(Box::new(child));
                Ok(())
            }
            (ProjectionSlot::Bindings, IrNode::New(new)) => {
                self.is_projection_to_class = true;
                self.is_anonymous = new.anonymous;
                Ok(())
            }
            (ProjectionSlot::Bindings, IrNode::Parameter(parameter)) => {
                let alias = self.ensure_named(context)?;
                self.bindings = std::mem::take(&mut self.bindings)
                    .into_iter()
                    .map(|binding| rename_parameter(binding, &parameter.name, &alias))
                    .collect();
                self.bound = true;
                Ok(())
            }
            (ProjectionSlot::Bindings, child @ IrNode::NamedBinding(_)) => {
                self.bindings.push(child);
                Ok(())
            }
            (ProjectionSlot::Bindings, child) if child.is_scalar() => {
                self.bindings.push(child);
                Ok(())
            }
            (_, child) => Err(invalid("Projection", &child)),
        }
    }

    /// Names the source if it is not named yet and returns its alias.
    pub(crate) fn ensure_named(&mut self, context: &mut ApplyContext) -> Result<Parameter> {
        let source = self
            .source
            .take()
            .ok_or(TranslationError::Incomplete("Projection source"))?;
        let (source, alias) = named(*source, context);
        self.source = Some(Box::new(source));
        Ok(alias)
    }

    /// Alias of the named source.
    #[must_use]
    pub fn alias(&self) -> Option<&Parameter> {
        match self.source.as_deref()? {
            IrNode::NamedSource(named) => Some(&named.parameter),
            _ => None,
        }
    }

    /// The expression projected under `name`.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&IrNode> {
        self.bindings.iter().find_map(|binding| match binding {
            IrNode::NamedBinding(named) if named.name.eq_ignore_ascii_case(name) => {
                named.expression.as_deref()
            }
            IrNode::SimpleBinding(simple) if simple.name.eq_ignore_ascii_case(name) => {
                Some(binding)
            }
            _ => None,
        })
    }

    /// The single projected value of a scalar projection.
    #[must_use]
    pub fn single_value(&self) -> Option<&IrNode> {
        match self.bindings.as_slice() {
            [only] if !self.is_projection_to_class => match only {
                IrNode::NamedBinding(named) => named.expression.as_deref(),
                other => Some(other),
            },
            _ => None,
        }
    }
}

/// Slot a [`GroupBy`] fills next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBySlot {
    Source,
    Keys,
    Values,
    Complete,
}

/// Rows of a source grouped by key expressions, with per-group values.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub ty: QueryType,
    pub source: Option<Box<IrNode>>,
    pub keys: Vec<IrNode>,
    pub values: Vec<IrNode>,
    slot: GroupBySlot,
}

impl GroupBy {
    #[must_use]
    pub const fn new(ty: QueryType) -> Self {
        Self {
            ty,
            source: None,
            keys: Vec::new(),
            values: Vec::new(),
            slot: GroupBySlot::Source,
        }
    }

    #[must_use]
    pub const fn slot(&self) -> GroupBySlot {
        self.slot
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.slot, GroupBySlot::Values | GroupBySlot::Complete) && !self.keys.is_empty()
    }

    pub(crate) fn apply(&mut self, child: IrNode, context: &mut ApplyContext) -> Result<()> {
        match (self.slot, child) {
            (
                GroupBySlot::Source,
                child @ (IrNode::Projection(_)
                | IrNode::Filter(_)
                | IrNode::QuerySource(_)
                | IrNode::NamedSource(_)),
            ) => {
                self.source = Some(Box::new(child));
                self.slot = GroupBySlot::Keys;
                Ok(())
            }
            (GroupBySlot::Keys | GroupBySlot::Values, IrNode::New(_)) => Ok(()),
            (GroupBySlot::Keys, IrNode::Parameter(parameter)) => {
                let alias = self.ensure_named(context)?;
                self.keys = rename_all(std::mem::take(&mut self.keys), &parameter, &alias);
                self.slot = GroupBySlot::Values;
                Ok(())
            }
            (GroupBySlot::Values, IrNode::Parameter(parameter)) => {
                let alias = self.ensure_named(context)?;
                self.values = rename_all(std::mem::take(&mut self.values), &parameter, &alias);
                self.slot = GroupBySlot::Complete;
                Ok(())
            }
            (GroupBySlot::Keys, child)
                if child.is_scalar() || matches!(child, IrNode::NamedBinding(_)) =>
            {
                self.keys.push(child);
                Ok(())
            }
            (GroupBySlot::Values, child)
                if child.is_scalar() || matches!(child, IrNode::NamedBinding(_)) =>
            {
                self.values.push(child);
                Ok(())
            }
            (_, child) => Err(invalid("GroupBy", &child)),
        }
    }

    fn ensure_named(&mut self, context: &mut ApplyContext) -> Result<Parameter> {
        let source = self
            .source
            .take()
            .ok_or(TranslationError::Incomplete("GroupBy source"))?;
        let (source, alias) = named(*source, context);
        self.source = Some(Box::new(source));
        Ok(alias)
    }
}

fn rename_all(nodes: Vec<IrNode>, from: &Parameter, to: &Parameter) -> Vec<IrNode> {
    nodes
        .into_iter()
        .map(|node| rename_parameter(node, &from.name, to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SqlValue;
    use crate::ir::{Constant, SimpleBinding};
    use crate::query::{BinaryOp, ScalarType};
    use crate::schema::{ColumnDescriptor, ColumnKind, DataType};

    static PEOPLE: EntityDescriptor = EntityDescriptor {
        schema: "crm",
        name: "person",
        columns: &[
            ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
            ColumnDescriptor::new("age", ColumnKind::Scalar(DataType::Integer)),
        ],
        indexes: &[],
    };

    fn int_type() -> QueryType {
        QueryType::Scalar(ScalarType::Integer)
    }

    fn member(name: &str, parameter: &str) -> IrNode {
        let mut binding = SimpleBinding::new(name, int_type());
        binding
            .apply(IrNode::Parameter(Parameter::new(parameter, QueryType::Entity(&PEOPLE))))
            .unwrap();
        IrNode::SimpleBinding(binding)
    }

    fn compare(left: IrNode, value: i64) -> IrNode {
        let mut binary = Binary::new(QueryType::BOOL, BinaryOp::GreaterThan);
        binary.apply(left).unwrap();
        binary
            .apply(IrNode::Constant(Constant::new(SqlValue::Int(value))))
            .unwrap();
        IrNode::Binary(binary)
    }

    fn x() -> IrNode {
        IrNode::Parameter(Parameter::new("x", QueryType::Entity(&PEOPLE)))
    }

    #[test]
    fn test_filter_first_source_wins() {
        let mut context = ApplyContext::new();
        let mut filter = Filter::new(QueryType::Entity(&PEOPLE));
        assert_eq!(filter.slot(), FilterSlot::Source);
        filter
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        assert_eq!(filter.slot(), FilterSlot::Predicate);
        let again = filter.apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context);
        assert!(again.is_err());
    }

    #[test]
    fn test_filter_parameter_names_source_and_binds_predicate() {
        let mut context = ApplyContext::new();
        let mut filter = Filter::new(QueryType::Entity(&PEOPLE));
        filter
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        filter.apply(compare(member("age", "x"), 18), &mut context).unwrap();
        assert!(!filter.is_complete());
        filter.apply(x(), &mut context).unwrap();
        assert!(filter.is_complete());
        assert_eq!(filter.alias().map(|p| p.name.as_str()), Some("a"));
        assert_eq!(filter.expression.as_deref(), Some(&compare(member("age", "a"), 18)));
    }

    #[test]
    fn test_filter_appends_with_and() {
        let mut context = ApplyContext::new();
        let mut filter = Filter::new(QueryType::Entity(&PEOPLE));
        filter
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        filter.apply(compare(member("age", "x"), 18), &mut context).unwrap();
        filter.apply(x(), &mut context).unwrap();
        filter.apply(compare(member("id", "x"), 5), &mut context).unwrap();
        filter.apply(x(), &mut context).unwrap();
        let expected = Binary::and(compare(member("age", "a"), 18), compare(member("id", "a"), 5));
        assert_eq!(filter.expression.as_deref(), Some(&expected));
    }

    #[test]
    fn test_projection_new_marks_class() {
        let mut context = ApplyContext::new();
        let mut projection = Projection::new(QueryType::Unknown);
        projection
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        projection
            .apply(IrNode::New(New::new(QueryType::Unknown, true)), &mut context)
            .unwrap();
        assert!(projection.is_projection_to_class);
        assert!(projection.is_anonymous);
    }

    #[test]
    fn test_projection_names_source_once() {
        let mut context = ApplyContext::new();
        let mut projection = Projection::new(int_type());
        projection
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        projection.apply(member("age", "x"), &mut context).unwrap();
        projection.apply(x(), &mut context).unwrap();
        assert!(projection.is_complete());
        assert_eq!(projection.alias().map(|p| p.name.as_str()), Some("a"));
        assert_eq!(projection.bindings, vec![member("age", "a")]);

        let alias = projection.ensure_named(&mut context).unwrap();
        assert_eq!(alias.name, "a");
    }

    #[test]
    fn test_group_by_switches_from_keys_to_values() {
        let mut context = ApplyContext::new();
        let mut group = GroupBy::new(QueryType::Unknown);
        group
            .apply(IrNode::QuerySource(QuerySource::new(&PEOPLE)), &mut context)
            .unwrap();
        assert_eq!(group.slot(), GroupBySlot::Keys);
        group.apply(member("age", "x"), &mut context).unwrap();
        group.apply(x(), &mut context).unwrap();
        assert_eq!(group.slot(), GroupBySlot::Values);
        assert!(group.is_complete());
        group.apply(member("id", "x"), &mut context).unwrap();
        group.apply(x(), &mut context).unwrap();
        assert_eq!(group.slot(), GroupBySlot::Complete);
        assert_eq!(group.keys, vec![member("age", "a")]);
        assert_eq!(group.values, vec![member("id", "a")]);
    }
}
