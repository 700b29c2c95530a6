//! Entity Resolver Module
//!
//! Translates between live objects and the serials persisted for them.
//!
//! ## Responsibilities
//! - Writers: live reference → serial (`Serial::MINUS_ONE` for deleted)
//! - Readers: serial → live reference, or `None` if it no longer exists
//!
//! The registry of live objects belongs to the world state, not to the
//! serializer, so every writer and reader is handed a resolver at
//! construction time.
//!
//! ## Reference Kinds
//! ```text
//! ┌─────────┬────────────────────────────┐
//! │ Item    │ generic entities           │
//! │ Actor   │ mobile/acting entities     │
//! │ Group   │ guilds and other groupings │
//! └─────────┴────────────────────────────┘
//! ```

mod memory;
mod serial;

pub use memory::{Entity, EntityKind, MemoryResolver};
pub use serial::SerialResolver;

use std::sync::Arc;

use crate::types::Serial;

/// Lookup capability injected into writers and readers
pub trait EntityResolver {
    /// Live handle of a generic entity
    type Item;
    /// Live handle of an actor
    type Actor;
    /// Live handle of a group
    type Group;

    fn find_item(&self, serial: Serial) -> Option<Self::Item>;
    fn find_actor(&self, serial: Serial) -> Option<Self::Actor>;
    fn find_group(&self, serial: Serial) -> Option<Self::Group>;

    /// Serial to persist for `item`, `Serial::MINUS_ONE` if it is deleted
    fn item_serial(&self, item: &Self::Item) -> Serial;
    fn actor_serial(&self, actor: &Self::Actor) -> Serial;
    fn group_serial(&self, group: &Self::Group) -> Serial;
}

impl<R: EntityResolver + ?Sized> EntityResolver for &R {
    type Item = R::Item;
    type Actor = R::Actor;
    type Group = R::Group;

    fn find_item(&self, serial: Serial) -> Option<Self::Item> {
        (**self).find_item(serial)
    }

    fn find_actor(&self, serial: Serial) -> Option<Self::Actor> {
        (**self).find_actor(serial)
    }

    fn find_group(&self, serial: Serial) -> Option<Self::Group> {
        (**self).find_group(serial)
    }

    fn item_serial(&self, item: &Self::Item) -> Serial {
        (**self).item_serial(item)
    }

    fn actor_serial(&self, actor: &Self::Actor) -> Serial {
        (**self).actor_serial(actor)
    }

    fn group_serial(&self, group: &Self::Group) -> Serial {
        (**self).group_serial(group)
    }
}

impl<R: EntityResolver + ?Sized> EntityResolver for Arc<R> {
    type Item = R::Item;
    type Actor = R::Actor;
    type Group = R::Group;

    fn find_item(&self, serial: Serial) -> Option<Self::Item> {
        (**self).find_item(serial)
    }

    fn find_actor(&self, serial: Serial) -> Option<Self::Actor> {
        (**self).find_actor(serial)
    }

    fn find_group(&self, serial: Serial) -> Option<Self::Group> {
        (**self).find_group(serial)
    }

    fn item_serial(&self, item: &Self::Item) -> Serial {
        (**self).item_serial(item)
    }

    fn actor_serial(&self, actor: &Self::Actor) -> Serial {
        (**self).actor_serial(actor)
    }

    fn group_serial(&self, group: &Self::Group) -> Serial {
        (**self).group_serial(group)
    }
}
