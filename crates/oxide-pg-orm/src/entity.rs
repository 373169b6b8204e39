//! Runtime entity traits.
//!
//! Static metadata lives in [`EntityDescriptor`]; an [`Entity`] is one
//! in-memory row of such a type. Entities are shared as [`EntityRef`]s so
//! that object graphs, cycles included, can be handed to the repository.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use oxide_pg_core::schema::EntityDescriptor;
use oxide_pg_core::SqlValue;

use crate::key::{EntityKey, TableId};

/// A shared handle to an entity.
pub type EntityRef = Arc<dyn Entity>;

/// The current value of a relation column.
#[derive(Debug, Clone)]
pub enum Relation {
    /// A single-valued relation, `None` when unset.
    One(Option<EntityRef>),
    /// A collection relation.
    Many(Vec<EntityRef>),
}

/// One row of an entity type.
pub trait Entity: fmt::Debug + Send + Sync {
    /// Static metadata of the entity type.
    fn descriptor(&self) -> &'static EntityDescriptor;

    /// Primary-key value.
    fn key(&self) -> SqlValue;

    /// Value of a scalar or enum column. `None` is stored as NULL.
    fn value(&self, column: &str) -> Option<SqlValue>;

    /// Value of a relation column.
    fn relation(&self, column: &str) -> Relation {
        let _ = column;
        Relation::One(None)
    }

    /// Optimistic-concurrency version; `0` until stamped.
    fn version(&self) -> i64 {
        0
    }

    /// Stamps a new version.
    fn set_version(&self, version: i64) {
        let _ = version;
    }

    /// `(table, primary key)` identity.
    fn entity_key(&self) -> EntityKey {
        EntityKey::new(TableId::new(self.descriptor().qualified_name()), &self.key())
    }
}

/// An entity type known at compile time.
///
/// Updates and deletes are addressed by type rather than by instance.
pub trait EntityType: Entity {
    const DESCRIPTOR: &'static EntityDescriptor;
}

/// Interior-mutable version cell for entities shared behind [`EntityRef`].
#[derive(Debug, Default)]
pub struct VersionStamp(AtomicI64);

impl VersionStamp {
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(AtomicI64::new(version))
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, version: i64) {
        self.0.store(version, Ordering::Release);
    }

    /// Returns true while the default version is still in place.
    pub fn is_unstamped(&self) -> bool {
        self.get() == 0
    }
}

impl Clone for VersionStamp {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}
