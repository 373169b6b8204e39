//! Dynamic entities shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use oxide_pg_core::schema::{
    ColumnDescriptor, ColumnKind, DataType, EntityDescriptor, IndexDescriptor,
};
use oxide_pg_core::{SqlValue, ToSqlValue};
use parking_lot::Mutex;

use crate::entity::{Entity, EntityRef, Relation, VersionStamp};

pub static PERSON: EntityDescriptor = EntityDescriptor {
    schema: "crm",
    name: "person",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("manager", ColumnKind::Reference(person)).nullable(),
        ColumnDescriptor::new("friends", ColumnKind::Collection(person)),
    ],
    indexes: &[],
};

pub static ACCOUNT: EntityDescriptor = EntityDescriptor {
    schema: "crm",
    name: "account",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("iban", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("owner", ColumnKind::Reference(person)),
    ],
    indexes: &[IndexDescriptor::new(&["iban"]).unique()],
};

pub static TAG: EntityDescriptor = EntityDescriptor {
    schema: "crm",
    name: "tag",
    columns: &[ColumnDescriptor::new("label", ColumnKind::PrimaryKey(DataType::Text))],
    indexes: &[],
};

/// Rows that must reference each other, which no insert order satisfies.
pub static LOOP: EntityDescriptor = EntityDescriptor {
    schema: "crm",
    name: "loop",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("next", ColumnKind::Reference(looped)),
    ],
    indexes: &[],
};

fn person() -> &'static EntityDescriptor {
    &PERSON
}

fn looped() -> &'static EntityDescriptor {
    &LOOP
}

/// A row of any descriptor, with values and relations set after creation.
#[derive(Debug)]
pub struct Row {
    descriptor: &'static EntityDescriptor,
    key: SqlValue,
    version: VersionStamp,
    values: Mutex<HashMap<&'static str, SqlValue>>,
    relations: Mutex<HashMap<&'static str, Relation>>,
}

impl Row {
    pub fn new(descriptor: &'static EntityDescriptor, key: impl ToSqlValue) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            key: key.to_sql_value(),
            version: VersionStamp::default(),
            values: Mutex::new(HashMap::new()),
            relations: Mutex::new(HashMap::new()),
        })
    }

    pub fn set(&self, column: &'static str, value: impl ToSqlValue) -> &Self {
        self.values.lock().insert(column, value.to_sql_value());
        self
    }

    pub fn link(&self, column: &'static str, target: &Arc<Self>) -> &Self {
        let target: EntityRef = target.clone();
        self.relations.lock().insert(column, Relation::One(Some(target)));
        self
    }

    pub fn push(&self, column: &'static str, target: &Arc<Self>) -> &Self {
        let target: EntityRef = target.clone();
        let mut relations = self.relations.lock();
        match relations.entry(column).or_insert_with(|| Relation::Many(Vec::new())) {
            Relation::Many(targets) => targets.push(target),
            Relation::One(_) => panic!("{column} is single-valued"),
        }
        self
    }
}

impl Entity for Row {
    fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    fn key(&self) -> SqlValue {
        self.key.clone()
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        self.values.lock().get(column).cloned()
    }

    fn relation(&self, column: &str) -> Relation {
        self.relations
            .lock()
            .get(column)
            .cloned()
            .unwrap_or(Relation::One(None))
    }

    fn version(&self) -> i64 {
        self.version.get()
    }

    fn set_version(&self, version: i64) {
        self.version.set(version);
    }
}

pub fn entity(row: &Arc<Row>) -> EntityRef {
    row.clone()
}
