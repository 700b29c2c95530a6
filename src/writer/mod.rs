//! Writer Module
//!
//! The Writer Interface and its two implementations.
//!
//! ## Implementations
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────┐
//! │ BinaryFileWriter     │ fixed buffer, flushed on the caller's    │
//! │                      │ thread when the next write won't fit     │
//! ├──────────────────────┼──────────────────────────────────────────┤
//! │ AsyncWriter          │ growing buffer rotated to a background   │
//! │                      │ worker once it reaches its capacity      │
//! └──────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Both implement [`GenericWriter`]. An implementation supplies the raw
//! append and lifecycle hooks; every typed write is a provided method, so the
//! two produce byte-identical streams for the same call sequence.

mod async_writer;
mod buffered;
mod sink;
mod worker;

pub use async_writer::{active_workers, wait_for_workers, AsyncWriter, WorkerState};
pub use buffered::BinaryFileWriter;
pub use sink::FileSink;

use std::net::Ipv4Addr;

use crate::codec::{self, MAX_ENCODED_INT_LEN, MAX_UTF8_CHAR_LEN};
use crate::error::{PersistError, Result};
use crate::resolver::EntityResolver;
use crate::types::{
    Clock, Decimal, MapIndex, Point2D, Point3D, Rectangle2D, Serial, TimeSpan, Timestamp,
};

/// Convert a collection or string length to its i32 wire form
fn wire_len(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        PersistError::Malformed(format!("{} of length {} does not fit in an i32", what, len))
    })
}

/// Contract every stream writer satisfies
///
/// Writes append to the implementation's buffer and only fail on I/O
/// trouble or after `close`.
pub trait GenericWriter {
    /// Resolver used to turn live references into serials
    type Resolver: EntityResolver;

    // -------------------------------------------------------------------------
    // Implementation hooks
    // -------------------------------------------------------------------------

    /// Append `bytes` as one unit; never split across two physical writes
    fn write_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Total bytes logically written, flushed or not
    fn position(&self) -> u64;

    /// Flush everything and release the sink. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Whether strings carry a presence byte
    fn prefix_strings(&self) -> bool;

    fn resolver(&self) -> &Self::Resolver;

    /// Source of "now" for delta-encoded timestamps
    fn clock(&self) -> &dyn Clock;

    /// Length-prefixed UTF-8 body of a string, without presence byte
    fn write_string_body(&mut self, value: &str) -> Result<()> {
        self.write_encoded_int(wire_len(value.len(), "string")?)?;
        self.write_raw(value.as_bytes())
    }

    // -------------------------------------------------------------------------
    // Fixed-width primitives
    // -------------------------------------------------------------------------

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_u64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_raw(&[value])
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    // -------------------------------------------------------------------------
    // Variable-length and text
    // -------------------------------------------------------------------------

    fn write_encoded_int(&mut self, value: i32) -> Result<()> {
        let mut scratch = [0u8; MAX_ENCODED_INT_LEN];
        let len = codec::encoded_int_len(value);
        codec::put_encoded_int(&mut &mut scratch[..], value);
        self.write_raw(&scratch[..len])
    }

    fn write_char(&mut self, value: char) -> Result<()> {
        let mut scratch = [0u8; MAX_UTF8_CHAR_LEN];
        self.write_raw(value.encode_utf8(&mut scratch).as_bytes())
    }

    /// Write a string
    ///
    /// In prefixed mode `None` is a single `0` byte; otherwise it is encoded
    /// as the empty string.
    fn write_string(&mut self, value: Option<&str>) -> Result<()> {
        if !self.prefix_strings() {
            return self.write_string_body(value.unwrap_or_default());
        }

        match value {
            None => self.write_u8(0),
            Some(s) => {
                self.write_u8(1)?;
                self.write_string_body(s)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    fn write_timestamp(&mut self, value: Timestamp) -> Result<()> {
        self.write_i64(value.ticks())
    }

    /// Write `value` as a signed offset from this writer's clock
    fn write_delta_time(&mut self, value: Timestamp) -> Result<()> {
        let now = self.clock().now();
        self.write_time_span(value.since(now))
    }

    fn write_time_span(&mut self, value: TimeSpan) -> Result<()> {
        self.write_i64(value.ticks())
    }

    // -------------------------------------------------------------------------
    // Composite values
    // -------------------------------------------------------------------------

    fn write_decimal(&mut self, value: Decimal) -> Result<()> {
        for part in value.to_parts() {
            self.write_i32(part)?;
        }
        Ok(())
    }

    fn write_ip_addr(&mut self, value: Ipv4Addr) -> Result<()> {
        self.write_i64(codec::ip_to_wire(value))
    }

    fn write_point2d(&mut self, value: Point2D) -> Result<()> {
        self.write_i32(value.x)?;
        self.write_i32(value.y)
    }

    fn write_point3d(&mut self, value: Point3D) -> Result<()> {
        self.write_i32(value.x)?;
        self.write_i32(value.y)?;
        self.write_i32(value.z)
    }

    fn write_rect2d(&mut self, value: Rectangle2D) -> Result<()> {
        self.write_point2d(value.start)?;
        self.write_point2d(value.end)
    }

    fn write_map(&mut self, value: Option<MapIndex>) -> Result<()> {
        self.write_u8(MapIndex::to_byte(value))
    }

    // -------------------------------------------------------------------------
    // Entity references
    // -------------------------------------------------------------------------

    fn write_serial(&mut self, value: Serial) -> Result<()> {
        self.write_i32(value.value())
    }

    fn write_item(&mut self, value: Option<&<Self::Resolver as EntityResolver>::Item>) -> Result<()> {
        let serial = value.map_or(Serial::MINUS_ONE, |item| self.resolver().item_serial(item));
        self.write_serial(serial)
    }

    fn write_actor(&mut self, value: Option<&<Self::Resolver as EntityResolver>::Actor>) -> Result<()> {
        let serial = value.map_or(Serial::MINUS_ONE, |actor| self.resolver().actor_serial(actor));
        self.write_serial(serial)
    }

    fn write_group(&mut self, value: Option<&<Self::Resolver as EntityResolver>::Group>) -> Result<()> {
        let serial = value.map_or(Serial::MINUS_ONE, |group| self.resolver().group_serial(group));
        self.write_serial(serial)
    }

    // -------------------------------------------------------------------------
    // Entity collections
    // -------------------------------------------------------------------------

    /// Write count + item references
    ///
    /// With `tidy`, deleted items are removed from `list` before the count
    /// is taken.
    fn write_item_list(
        &mut self,
        list: &mut Vec<<Self::Resolver as EntityResolver>::Item>,
        tidy: bool,
    ) -> Result<()> {
        if tidy {
            let resolver = self.resolver();
            list.retain(|item| !resolver.item_serial(item).is_null());
        }

        self.write_i32(wire_len(list.len(), "item list")?)?;
        for item in list.iter() {
            self.write_item(Some(item))?;
        }
        Ok(())
    }

    fn write_actor_list(
        &mut self,
        list: &mut Vec<<Self::Resolver as EntityResolver>::Actor>,
        tidy: bool,
    ) -> Result<()> {
        if tidy {
            let resolver = self.resolver();
            list.retain(|actor| !resolver.actor_serial(actor).is_null());
        }

        self.write_i32(wire_len(list.len(), "actor list")?)?;
        for actor in list.iter() {
            self.write_actor(Some(actor))?;
        }
        Ok(())
    }

    fn write_group_list(
        &mut self,
        list: &mut Vec<<Self::Resolver as EntityResolver>::Group>,
        tidy: bool,
    ) -> Result<()> {
        if tidy {
            let resolver = self.resolver();
            list.retain(|group| !resolver.group_serial(group).is_null());
        }

        self.write_i32(wire_len(list.len(), "group list")?)?;
        for group in list.iter() {
            self.write_group(Some(group))?;
        }
        Ok(())
    }
}
