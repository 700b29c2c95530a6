//! Pass-through resolver
//!
//! Treats serials themselves as the live handles. Useful for tools that
//! inspect a stream without a world to resolve against.

use super::EntityResolver;
use crate::types::Serial;

/// Resolver whose handles are plain serials
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialResolver;

impl SerialResolver {
    fn pass(serial: Serial) -> Option<Serial> {
        (!serial.is_null()).then_some(serial)
    }
}

impl EntityResolver for SerialResolver {
    type Item = Serial;
    type Actor = Serial;
    type Group = Serial;

    fn find_item(&self, serial: Serial) -> Option<Serial> {
        Self::pass(serial)
    }

    fn find_actor(&self, serial: Serial) -> Option<Serial> {
        Self::pass(serial)
    }

    fn find_group(&self, serial: Serial) -> Option<Serial> {
        Self::pass(serial)
    }

    fn item_serial(&self, item: &Serial) -> Serial {
        *item
    }

    fn actor_serial(&self, actor: &Serial) -> Serial {
        *actor
    }

    fn group_serial(&self, group: &Serial) -> Serial {
        *group
    }
}
