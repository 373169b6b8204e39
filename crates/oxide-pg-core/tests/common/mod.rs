#![allow(dead_code)]

use oxide_pg_core::migrations::{
    ColumnConstraint, ColumnNode, DatabaseNode, EnumTypeNode, SchemaNode, TableNode,
};
use oxide_pg_core::schema::{
    ColumnDescriptor, ColumnKind, DataType, EntityDescriptor, EnumDescriptor, Ident,
    IndexDescriptor,
};

pub static GENRE: EnumDescriptor = EnumDescriptor {
    schema: "library",
    name: "genre",
    values: &["fiction", "essay"],
};

pub static AUTHOR: EntityDescriptor = EntityDescriptor {
    schema: "library",
    name: "author",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("born", ColumnKind::Scalar(DataType::Integer)).nullable(),
    ],
    indexes: &[IndexDescriptor::new(&["name"])],
};

pub static BOOK: EntityDescriptor = EntityDescriptor {
    schema: "library",
    name: "book",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("title", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("pages", ColumnKind::Scalar(DataType::Integer)),
        ColumnDescriptor::new("genre", ColumnKind::Enum(&GENRE)),
        ColumnDescriptor::new("author", ColumnKind::Reference(author)),
    ],
    indexes: &[],
};

pub fn author() -> &'static EntityDescriptor {
    &AUTHOR
}

pub fn id(name: &str) -> Ident {
    Ident::from(name)
}

pub fn enum_type(values: &[&str]) -> EnumTypeNode {
    EnumTypeNode {
        schema: id("library"),
        name: id("genre"),
        values: values.iter().map(|v| (*v).to_string()).collect(),
    }
}

pub fn table(name: &str, columns: Vec<ColumnNode>) -> TableNode {
    TableNode {
        schema: id("library"),
        name: id(name),
        columns,
    }
}

pub fn key(name: &str) -> ColumnNode {
    ColumnNode::new(name, DataType::Bigint)
        .with(ColumnConstraint::PrimaryKey)
        .with(ColumnConstraint::NotNull)
}

/// `app@localhost` with one `library` schema holding `tables`.
pub fn database(enum_types: Vec<EnumTypeNode>, tables: Vec<TableNode>) -> DatabaseNode {
    let mut schema = SchemaNode::new("library");
    schema.enum_types = enum_types;
    schema.tables = tables;
    let mut database = DatabaseNode::new("app", "localhost");
    database.schemas.push(schema);
    database
}
