#![allow(dead_code)]

use oxide_pg_core::migrations::{CodeModelBuilder, DatabaseNode};
use oxide_pg_core::schema::{
    ColumnDescriptor, ColumnKind, DataType, EntityDescriptor, EnumDescriptor,
};
use oxide_pg_migrate::{ModelChangesExtractor, SnapshotIntrospector};

pub const DATABASE: &str = "app";
pub const HOST: &str = "localhost";

pub static STATUS: EnumDescriptor = EnumDescriptor {
    schema: "shop",
    name: "status",
    values: &["open", "shipped"],
};

/// The customer table before `email` was added.
pub static CUSTOMER_V1: EntityDescriptor = EntityDescriptor {
    schema: "shop",
    name: "customer",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
    ],
    indexes: &[],
};

pub static CUSTOMER: EntityDescriptor = EntityDescriptor {
    schema: "shop",
    name: "customer",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("email", ColumnKind::Scalar(DataType::Text)).nullable(),
    ],
    indexes: &[],
};

pub static PURCHASE: EntityDescriptor = EntityDescriptor {
    schema: "shop",
    name: "purchase",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("customer", ColumnKind::Reference(customer)),
        ColumnDescriptor::new("status", ColumnKind::Enum(&STATUS)),
    ],
    indexes: &[],
};

pub fn customer() -> &'static EntityDescriptor {
    &CUSTOMER
}

/// An extractor whose live database is `snapshot`.
pub fn extractor(snapshot: Option<DatabaseNode>) -> ModelChangesExtractor<SnapshotIntrospector> {
    ModelChangesExtractor::new(SnapshotIntrospector::new(snapshot), DATABASE, HOST)
}

/// The live database as it looks after migrating to `entities`.
pub fn migrated(entities: &[&'static EntityDescriptor]) -> DatabaseNode {
    let builder = entities
        .iter()
        .fold(CodeModelBuilder::new(), |builder, entity| builder.entity(*entity));
    extractor(None).expected_model(builder).unwrap()
}
