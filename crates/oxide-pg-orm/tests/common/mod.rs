#![allow(dead_code)]

use std::sync::Arc;

use oxide_pg_core::schema::{
    ColumnDescriptor, ColumnKind, DataType, EntityDescriptor, EnumDescriptor, IndexDescriptor,
};
use oxide_pg_orm::{
    Entity, EntityRef, EntityType, QueryRow, Relation, SqlValue, ToSqlValue, VersionStamp,
};
use parking_lot::Mutex;

pub static STATUS: EnumDescriptor = EnumDescriptor {
    schema: "shop",
    name: "status",
    values: &["open", "shipped"],
};

pub static CUSTOMER: EntityDescriptor = EntityDescriptor {
    schema: "shop",
    name: "customer",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("name", ColumnKind::Scalar(DataType::Text)),
        ColumnDescriptor::new("referrer", ColumnKind::Reference(customer)).nullable(),
        ColumnDescriptor::new("friends", ColumnKind::Collection(customer)),
    ],
    indexes: &[IndexDescriptor::new(&["name"])],
};

pub static PURCHASE: EntityDescriptor = EntityDescriptor {
    schema: "shop",
    name: "purchase",
    columns: &[
        ColumnDescriptor::new("id", ColumnKind::PrimaryKey(DataType::Bigint)),
        ColumnDescriptor::new("version", ColumnKind::Version),
        ColumnDescriptor::new("customer", ColumnKind::Reference(customer)),
        ColumnDescriptor::new("status", ColumnKind::Enum(&STATUS)),
        ColumnDescriptor::new("total", ColumnKind::Scalar(DataType::Double)),
    ],
    indexes: &[],
};

pub fn customer() -> &'static EntityDescriptor {
    &CUSTOMER
}

// =============================================================================
// Typed entities
// =============================================================================

#[derive(Debug)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub referrer: Mutex<Option<Arc<Customer>>>,
    pub friends: Mutex<Vec<Arc<Customer>>>,
    pub version: VersionStamp,
}

impl Customer {
    pub fn new(id: i64, name: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.to_string(),
            referrer: Mutex::new(None),
            friends: Mutex::new(Vec::new()),
            version: VersionStamp::default(),
        })
    }

    pub fn referred_by(&self, referrer: &Arc<Self>) {
        *self.referrer.lock() = Some(Arc::clone(referrer));
    }

    pub fn befriend(&self, friend: &Arc<Self>) {
        self.friends.lock().push(Arc::clone(friend));
    }
}

impl Entity for Customer {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &CUSTOMER
    }

    fn key(&self) -> SqlValue {
        SqlValue::Int(self.id)
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        match column {
            "name" => Some(self.name.clone().to_sql_value()),
            _ => None,
        }
    }

    fn relation(&self, column: &str) -> Relation {
        match column {
            "referrer" => Relation::One(self.referrer.lock().clone().map(|c| c as EntityRef)),
            "friends" => Relation::Many(
                self.friends
                    .lock()
                    .iter()
                    .map(|c| Arc::clone(c) as EntityRef)
                    .collect(),
            ),
            _ => Relation::One(None),
        }
    }

    fn version(&self) -> i64 {
        self.version.get()
    }

    fn set_version(&self, version: i64) {
        self.version.set(version);
    }
}

impl EntityType for Customer {
    const DESCRIPTOR: &'static EntityDescriptor = &CUSTOMER;
}

#[derive(Debug)]
pub struct Purchase {
    pub id: i64,
    pub customer: Arc<Customer>,
    pub status: &'static str,
    pub total: f64,
    pub version: VersionStamp,
}

impl Purchase {
    pub fn new(id: i64, customer: &Arc<Customer>, total: f64) -> Arc<Self> {
        Arc::new(Self {
            id,
            customer: Arc::clone(customer),
            status: "open",
            total,
            version: VersionStamp::default(),
        })
    }
}

impl Entity for Purchase {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &PURCHASE
    }

    fn key(&self) -> SqlValue {
        SqlValue::Int(self.id)
    }

    fn value(&self, column: &str) -> Option<SqlValue> {
        match column {
            "status" => Some(self.status.to_sql_value()),
            "total" => Some(self.total.to_sql_value()),
            _ => None,
        }
    }

    fn relation(&self, column: &str) -> Relation {
        match column {
            "customer" => Relation::One(Some(Arc::clone(&self.customer) as EntityRef)),
            _ => Relation::One(None),
        }
    }

    fn version(&self) -> i64 {
        self.version.get()
    }

    fn set_version(&self, version: i64) {
        self.version.set(version);
    }
}

impl EntityType for Purchase {
    const DESCRIPTOR: &'static EntityDescriptor = &PURCHASE;
}

// =============================================================================
// Helpers
// =============================================================================

pub fn entity<E: Entity + 'static>(entity: &Arc<E>) -> EntityRef {
    Arc::clone(entity) as EntityRef
}

/// One row of a version capture query.
pub fn version_row(version: i64, count: i64) -> QueryRow {
    QueryRow::new()
        .with("version", SqlValue::Int(version))
        .with("count", SqlValue::Int(count))
}
