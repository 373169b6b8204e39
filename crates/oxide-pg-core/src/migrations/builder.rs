//! Expected schema model derived from entity metadata.

use std::collections::BTreeSet;

use crate::error::SchemaError;
use crate::schema::{
    index_name, ColumnDescriptor, ColumnKind, DataType, EntityDescriptor, Ident, JunctionTable,
};

use super::snapshot::{
    ColumnConstraint, ColumnNode, DatabaseNode, EnumTypeNode, FunctionNode, IndexNode,
    ReferentialAction, SchemaNode, TableNode, TriggerNode, ViewNode,
};

/// Builds the snapshot that a set of entity types expects the database to
/// have.
///
/// Entities reachable through relations are included as well. Every
/// collection relation contributes a junction table `{owner}_{column}` with
/// `left`/`right` foreign keys and a unique index over both.
///
/// ```
/// use oxide_pg_core::migrations::CodeModelBuilder;
/// use oxide_pg_core::schema::{ColumnDescriptor, ColumnKind, DataType, EntityDescriptor};
///
/// static TAG: EntityDescriptor = EntityDescriptor {
///     schema: "blog",
///     name: "tag",
///     columns: &[ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Text))],
///     indexes: &[],
/// };
///
/// let database = CodeModelBuilder::new().entity(&TAG).build("app", "localhost").unwrap();
/// let table = database.schema("blog").and_then(|s| s.table("tag")).unwrap();
/// assert_eq!(table.columns.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CodeModelBuilder {
    entities: Vec<&'static EntityDescriptor>,
    views: Vec<ViewNode>,
    functions: Vec<FunctionNode>,
    triggers: Vec<TriggerNode>,
}

impl CodeModelBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity type and every entity type it relates to.
    #[must_use]
    pub fn entity(mut self, entity: &'static EntityDescriptor) -> Self {
        let mut pending = vec![entity];
        while let Some(next) = pending.pop() {
            if self.entities.contains(&next) {
                continue;
            }
            self.entities.push(next);
            pending.extend(next.related());
        }
        self
    }

    #[must_use]
    pub fn view(mut self, view: ViewNode) -> Self {
        self.views.push(view);
        self
    }

    #[must_use]
    pub fn function(mut self, function: FunctionNode) -> Self {
        self.functions.push(function);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: TriggerNode) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Builds the expected snapshot of database `name` on `host`.
    ///
    /// # Errors
    ///
    /// Fails for entities without a primary key, and for relations to
    /// entities without one.
    pub fn build(&self, name: &str, host: &str) -> Result<DatabaseNode, SchemaError> {
        let mut database = DatabaseNode::new(name, host);
        for entity in &self.entities {
            self.add_entity(&mut database, entity)?;
        }
        for view in &self.views {
            schema_mut(&mut database, &view.schema).views.push(view.clone());
        }
        for function in &self.functions {
            schema_mut(&mut database, &function.schema)
                .functions
                .push(function.clone());
        }
        for trigger in &self.triggers {
            schema_mut(&mut database, &trigger.schema)
                .triggers
                .push(trigger.clone());
        }
        Ok(database)
    }

    fn add_entity(
        &self,
        database: &mut DatabaseNode,
        entity: &'static EntityDescriptor,
    ) -> Result<(), SchemaError> {
        if entity.primary_key().is_none() {
            return Err(invalid(entity, "no primary key column"));
        }
        for column in entity.stored_columns() {
            if let ColumnKind::Enum(descriptor) = column.kind {
                let node = EnumTypeNode {
                    schema: Ident::from(descriptor.schema),
                    name: Ident::from(descriptor.name),
                    values: descriptor.values.iter().map(ToString::to_string).collect(),
                };
                let owner = schema_mut(database, &node.schema);
                if !owner.enum_types.iter().any(|e| e.name == node.name) {
                    owner.enum_types.push(node);
                }
            }
        }

        let columns = entity
            .stored_columns()
            .map(|column| column_node(entity, column))
            .collect::<Result<Vec<_>, _>>()?;
        let schema = schema_mut(database, &Ident::from(entity.schema));
        schema.tables.push(TableNode {
            schema: Ident::from(entity.schema),
            name: Ident::from(entity.name),
            columns,
        });

        for index in entity.indexes {
            schema.indexes.push(IndexNode {
                schema: Ident::from(entity.schema),
                table: Ident::from(entity.name),
                name: Ident::new(index.name(entity.name)),
                columns: index.columns.iter().map(|c| Ident::from(*c)).collect(),
                included_columns: index.included.iter().map(|c| Ident::from(*c)).collect(),
                unique: index.unique,
                predicate: index.predicate.map(ToString::to_string),
            });
        }

        for junction in entity.junctions() {
            let (table, index) = junction_table(&junction)?;
            schema.tables.push(table);
            schema.indexes.push(index);
        }
        Ok(())
    }
}

fn invalid(entity: &EntityDescriptor, reason: &str) -> SchemaError {
    SchemaError::InvalidEntity {
        entity: entity.to_string(),
        reason: reason.to_string(),
    }
}

fn schema_mut<'d>(database: &'d mut DatabaseNode, name: &Ident) -> &'d mut SchemaNode {
    let position = match database.schemas.iter().position(|s| s.name == *name) {
        Some(position) => position,
        None => {
            database.schemas.push(SchemaNode::new(name.clone()));
            database.schemas.len() - 1
        }
    };
    &mut database.schemas[position]
}

/// Type and foreign key of a column pointing at `target`'s primary key.
fn reference_to(
    owner: &EntityDescriptor,
    target: &'static EntityDescriptor,
    on_delete: ReferentialAction,
) -> Result<(DataType, ColumnConstraint), SchemaError> {
    let key = target
        .primary_key()
        .ok_or_else(|| invalid(owner, &format!("relation to {target} which has no primary key")))?;
    let data_type = key
        .data_type()
        .ok_or_else(|| invalid(owner, &format!("primary key of {target} has no stored type")))?;
    let constraint = ColumnConstraint::ForeignKey {
        schema: Ident::from(target.schema),
        table: Ident::from(target.name),
        column: Ident::from(key.name),
        on_delete,
    };
    Ok((data_type, constraint))
}

fn column_node(
    entity: &EntityDescriptor,
    column: &ColumnDescriptor,
) -> Result<ColumnNode, SchemaError> {
    let mut constraints = BTreeSet::new();
    let data_type = match &column.kind {
        ColumnKind::PrimaryKey(data_type) => {
            constraints.insert(ColumnConstraint::PrimaryKey);
            constraints.insert(ColumnConstraint::NotNull);
            data_type.clone()
        }
        ColumnKind::Version => {
            constraints.insert(ColumnConstraint::NotNull);
            DataType::Bigint
        }
        ColumnKind::Scalar(data_type) => data_type.clone(),
        ColumnKind::Enum(descriptor) => descriptor.data_type(),
        ColumnKind::Reference(target) => {
            let (data_type, foreign_key) =
                reference_to(entity, target(), ReferentialAction::Restrict)?;
            constraints.insert(foreign_key);
            data_type
        }
        ColumnKind::Collection(_) => {
            return Err(invalid(entity, &format!("collection {} has no column", column.name)))
        }
    };
    if !matches!(column.kind, ColumnKind::PrimaryKey(_) | ColumnKind::Version) {
        if !column.nullable {
            constraints.insert(ColumnConstraint::NotNull);
        }
        if column.unique {
            constraints.insert(ColumnConstraint::Unique);
        }
        if let Some(default) = column.default {
            constraints.insert(ColumnConstraint::Default(default.to_string()));
        }
    }
    Ok(ColumnNode {
        name: Ident::from(column.name),
        data_type,
        constraints,
    })
}

fn junction_table(junction: &JunctionTable) -> Result<(TableNode, IndexNode), SchemaError> {
    let side = |name: &'static str, target: &'static EntityDescriptor| {
        reference_to(junction.owner, target, ReferentialAction::Cascade).map(|(data_type, fk)| {
            ColumnNode::new(name, data_type)
                .with(ColumnConstraint::NotNull)
                .with(fk)
        })
    };
    let schema = Ident::from(junction.schema());
    let name = Ident::new(junction.name());
    let table = TableNode {
        schema: schema.clone(),
        name: name.clone(),
        columns: vec![
            side(JunctionTable::LEFT, junction.owner)?,
            side(JunctionTable::RIGHT, junction.target)?,
        ],
    };
    let columns = [JunctionTable::LEFT, JunctionTable::RIGHT];
    let index = IndexNode {
        schema,
        table: name,
        name: Ident::new(index_name(&junction.name(), &columns)),
        columns: columns.iter().map(|c| Ident::from(*c)).collect(),
        included_columns: Vec::new(),
        unique: true,
        predicate: None,
    };
    Ok((table, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDescriptor, IndexDescriptor};

    static STATUS: EnumDescriptor = EnumDescriptor {
        schema: "shop",
        name: "status",
        values: &["open", "closed"],
    };

    static CUSTOMER: EntityDescriptor = EntityDescriptor {
        schema: "shop",
        name: "customer",
        columns: &[
            ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
            ColumnDescriptor::new("version", ColumnKind::Version),
            ColumnDescriptor::new("email", ColumnKind::Scalar(DataType::Text)).unique(),
        ],
        indexes: &[],
    };

    static PRODUCT: EntityDescriptor = EntityDescriptor {
        schema: "shop",
        name: "product",
        columns: &[ColumnDescriptor::new("sku", ColumnKind::PrimaryKey(DataType::Text))],
        indexes: &[],
    };

    static ORDER: EntityDescriptor = EntityDescriptor {
        schema: "shop",
        name: "order",
        columns: &[
            ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
            ColumnDescriptor::new("customer", ColumnKind::Reference(customer)),
            ColumnDescriptor::new("status", ColumnKind::Enum(&STATUS)).default_value("'open'"),
            ColumnDescriptor::new("note", ColumnKind::Scalar(DataType::Text)).nullable(),
            ColumnDescriptor::new("products", ColumnKind::Collection(product)),
        ],
        indexes: &[IndexDescriptor::new(&["status"])],
    };

    static NO_KEY: EntityDescriptor = EntityDescriptor {
        schema: "shop",
        name: "broken",
        columns: &[ColumnDescriptor::new("n", ColumnKind::Scalar(DataType::Integer))],
        indexes: &[],
    };

    fn customer() -> &'static EntityDescriptor {
        &CUSTOMER
    }

    fn product() -> &'static EntityDescriptor {
        &PRODUCT
    }

    fn model() -> DatabaseNode {
        CodeModelBuilder::new().entity(&ORDER).build("app", "db").unwrap()
    }

    #[test]
    fn test_related_entities_are_included() {
        let database = model();
        let shop = database.schema("shop").unwrap();
        let names: Vec<&str> = shop.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["order", "order_products", "product", "customer"]);
    }

    #[test]
    fn test_column_constraints() {
        let database = model();
        let shop = database.schema("shop").unwrap();
        let order = shop.table("order").unwrap();
        assert_eq!(order.columns.len(), 4);

        let customer = order.column("customer").unwrap();
        assert_eq!(customer.data_type, DataType::Bigint);
        assert!(customer.constraints.contains(&ColumnConstraint::NotNull));
        assert!(customer.constraints.contains(&ColumnConstraint::ForeignKey {
            schema: Ident::from("shop"),
            table: Ident::from("customer"),
            column: Ident::from("id"),
            on_delete: ReferentialAction::Restrict,
        }));

        let status = order.column("status").unwrap();
        assert!(status.data_type.is_enum());
        assert!(status
            .constraints
            .contains(&ColumnConstraint::Default(String::from("'open'"))));
        assert!(order.column("note").unwrap().is_nullable());

        let email = shop.table("customer").and_then(|t| t.column("email")).unwrap();
        assert!(email.constraints.contains(&ColumnConstraint::Unique));

        assert_eq!(shop.enum_types.len(), 1);
        assert_eq!(shop.enum_types[0].values, vec!["open", "closed"]);
    }

    #[test]
    fn test_junction_table_and_indexes() {
        let database = model();
        let shop = database.schema("shop").unwrap();
        let junction = shop.table("order_products").unwrap();
        let right = junction.column("right").unwrap();
        assert_eq!(right.data_type, DataType::Text);
        assert!(right.constraints.contains(&ColumnConstraint::ForeignKey {
            schema: Ident::from("shop"),
            table: Ident::from("product"),
            column: Ident::from("sku"),
            on_delete: ReferentialAction::Cascade,
        }));

        let names: Vec<&str> = shop.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["order_status_idx", "order_products_left_right_idx"]);
        assert!(shop.indexes[1].unique);
    }

    #[test]
    fn test_entity_without_key_is_rejected() {
        let err = CodeModelBuilder::new().entity(&NO_KEY).build("app", "db").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidEntity { entity, .. } if entity == "shop.broken"
        ));
    }
}
