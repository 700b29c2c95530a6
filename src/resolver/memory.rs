//! In-memory entity registry
//!
//! A thread-safe table of live entities per reference kind. Deleting an
//! entity flags the shared handle, so holders of an `Arc<Entity>` observe the
//! deletion, and drops it from the table, so later lookups miss.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::EntityResolver;
use crate::types::Serial;

/// Which table an entity lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Item,
    Actor,
    Group,
}

/// A live entity handle
#[derive(Debug)]
pub struct Entity {
    serial: Serial,
    kind: EntityKind,
    deleted: AtomicBool,
}

impl Entity {
    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

/// Entities are equal when they name the same serial in the same table
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial && self.kind == other.kind
    }
}

impl Eq for Entity {}

/// Registry of live entities
///
/// ## Concurrency:
/// - Each kind has its own RwLock-protected table
/// - Lookups take a read lock; register/delete take a write lock
#[derive(Debug, Default)]
pub struct MemoryResolver {
    items: RwLock<HashMap<Serial, Arc<Entity>>>,
    actors: RwLock<HashMap<Serial, Arc<Entity>>>,
    groups: RwLock<HashMap<Serial, Arc<Entity>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: EntityKind) -> &RwLock<HashMap<Serial, Arc<Entity>>> {
        match kind {
            EntityKind::Item => &self.items,
            EntityKind::Actor => &self.actors,
            EntityKind::Group => &self.groups,
        }
    }

    /// Register a live entity, replacing any previous one with the same serial
    pub fn register(&self, kind: EntityKind, serial: Serial) -> Arc<Entity> {
        let entity = Arc::new(Entity {
            serial,
            kind,
            deleted: AtomicBool::new(false),
        });
        self.table(kind).write().insert(serial, Arc::clone(&entity));
        entity
    }

    /// Mark an entity deleted and drop it from the registry
    ///
    /// Returns false if no such entity was registered.
    pub fn delete(&self, kind: EntityKind, serial: Serial) -> bool {
        match self.table(kind).write().remove(&serial) {
            Some(entity) => {
                entity.deleted.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Look up a live entity
    pub fn get(&self, kind: EntityKind, serial: Serial) -> Option<Arc<Entity>> {
        self.table(kind)
            .read()
            .get(&serial)
            .filter(|entity| !entity.is_deleted())
            .cloned()
    }

    /// Number of live entities of `kind`
    pub fn len(&self, kind: EntityKind) -> usize {
        self.table(kind).read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty() && self.actors.read().is_empty() && self.groups.read().is_empty()
    }

    fn serial_of(entity: &Entity) -> Serial {
        if entity.is_deleted() {
            Serial::MINUS_ONE
        } else {
            entity.serial
        }
    }
}

impl EntityResolver for MemoryResolver {
    type Item = Arc<Entity>;
    type Actor = Arc<Entity>;
    type Group = Arc<Entity>;

    fn find_item(&self, serial: Serial) -> Option<Arc<Entity>> {
        self.get(EntityKind::Item, serial)
    }

    fn find_actor(&self, serial: Serial) -> Option<Arc<Entity>> {
        self.get(EntityKind::Actor, serial)
    }

    fn find_group(&self, serial: Serial) -> Option<Arc<Entity>> {
        self.get(EntityKind::Group, serial)
    }

    fn item_serial(&self, item: &Arc<Entity>) -> Serial {
        Self::serial_of(item)
    }

    fn actor_serial(&self, actor: &Arc<Entity>) -> Serial {
        Self::serial_of(actor)
    }

    fn group_serial(&self, group: &Arc<Entity>) -> Serial {
        Self::serial_of(group)
    }
}
