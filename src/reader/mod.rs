//! Reader Module
//!
//! The Reader Interface, one decode operation per writer operation, and the
//! buffered sequential reader implementing it.
//!
//! ## Decode Rules
//! - Running out of input mid-value is `UnexpectedEof`, never a default
//! - A serial that no longer resolves decodes as `None`
//! - `*_list_or_null` maps a zero count to `None`; `*_list` to an empty `Vec`
//! - Delta timestamps saturate to `Timestamp::MIN`/`MAX`

mod binary;

pub use binary::BinaryFileReader;

use std::io::SeekFrom;
use std::net::Ipv4Addr;

use crate::codec;
use crate::error::{PersistError, Result};
use crate::resolver::EntityResolver;
use crate::types::{
    Clock, Decimal, MapIndex, Point2D, Point3D, Rectangle2D, Serial, TimeSpan, Timestamp,
};

/// Strings are pulled through a scratch buffer of this size, so a corrupt
/// length cannot force one huge allocation up front
const STRING_READ_CHUNK: usize = 4096;

/// Upper bound on capacity reserved from a decoded collection count
const MAX_PREALLOCATED_ENTRIES: usize = 1024;

/// Contract every stream reader satisfies
pub trait GenericReader {
    /// Resolver used to turn serials back into live references
    type Resolver: EntityResolver;

    // -------------------------------------------------------------------------
    // Implementation hooks
    // -------------------------------------------------------------------------

    /// Fill `buf` completely from the stream
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<()>;

    /// True iff no more data remains; consumes nothing
    fn end(&mut self) -> Result<bool>;

    fn position(&self) -> u64;

    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Whether strings carry a presence byte
    fn prefix_strings(&self) -> bool;

    fn resolver(&self) -> &Self::Resolver;

    /// Source of "now" for delta-encoded timestamps
    fn clock(&self) -> &dyn Clock;

    // -------------------------------------------------------------------------
    // Fixed-width primitives
    // -------------------------------------------------------------------------

    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_raw(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_raw(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_raw(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_raw(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_raw(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Any non-zero byte reads as `true`
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    // -------------------------------------------------------------------------
    // Variable-length and text
    // -------------------------------------------------------------------------

    fn read_encoded_int(&mut self) -> Result<i32> {
        codec::decode_encoded_int(|| self.read_u8())
    }

    fn read_char(&mut self) -> Result<char> {
        let lead = self.read_u8()?;
        let len = codec::utf8_len_from_lead(lead).ok_or_else(|| {
            PersistError::Malformed(format!("invalid UTF-8 lead byte 0x{:02x}", lead))
        })?;

        let mut buf = [0u8; codec::MAX_UTF8_CHAR_LEN];
        buf[0] = lead;
        self.read_raw(&mut buf[1..len])?;

        std::str::from_utf8(&buf[..len])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or_else(|| PersistError::Malformed(format!("invalid UTF-8 char {:02x?}", &buf[..len])))
    }

    /// Read a string
    ///
    /// `None` only in prefixed mode, when the presence byte is `0`.
    fn read_string(&mut self) -> Result<Option<String>> {
        if self.prefix_strings() && self.read_u8()? == 0 {
            return Ok(None);
        }

        let len = self.read_encoded_int()?;
        let len = usize::try_from(len)
            .map_err(|_| PersistError::Malformed(format!("negative string length {}", len)))?;

        let mut bytes = Vec::with_capacity(len.min(STRING_READ_CHUNK));
        let mut chunk = [0u8; STRING_READ_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(STRING_READ_CHUNK);
            self.read_raw(&mut chunk[..n])?;
            bytes.extend_from_slice(&chunk[..n]);
            remaining -= n;
        }

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| PersistError::Malformed(format!("string is not UTF-8: {}", e)))
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    fn read_timestamp(&mut self) -> Result<Timestamp> {
        let ticks = self.read_i64()?;
        Timestamp::from_ticks(ticks)
            .ok_or_else(|| PersistError::Malformed(format!("timestamp ticks {} out of range", ticks)))
    }

    /// Rebuild a delta-encoded timestamp against this reader's clock
    fn read_delta_time(&mut self) -> Result<Timestamp> {
        let delta = self.read_time_span()?;
        Ok(self.clock().now().saturating_add(delta))
    }

    fn read_time_span(&mut self) -> Result<TimeSpan> {
        Ok(TimeSpan::from_ticks(self.read_i64()?))
    }

    // -------------------------------------------------------------------------
    // Composite values
    // -------------------------------------------------------------------------

    fn read_decimal(&mut self) -> Result<Decimal> {
        let parts = [self.read_i32()?, self.read_i32()?, self.read_i32()?, self.read_i32()?];
        Decimal::from_parts(parts)
            .ok_or_else(|| PersistError::Malformed(format!("invalid decimal flags 0x{:08x}", parts[3])))
    }

    fn read_ip_addr(&mut self) -> Result<Ipv4Addr> {
        let value = self.read_i64()?;
        codec::ip_from_wire(value)
            .ok_or_else(|| PersistError::Malformed(format!("invalid IPv4 address value {}", value)))
    }

    fn read_point2d(&mut self) -> Result<Point2D> {
        Ok(Point2D::new(self.read_i32()?, self.read_i32()?))
    }

    fn read_point3d(&mut self) -> Result<Point3D> {
        Ok(Point3D::new(self.read_i32()?, self.read_i32()?, self.read_i32()?))
    }

    fn read_rect2d(&mut self) -> Result<Rectangle2D> {
        Ok(Rectangle2D::new(self.read_point2d()?, self.read_point2d()?))
    }

    /// `None` for the "no map" byte
    fn read_map(&mut self) -> Result<Option<MapIndex>> {
        Ok(MapIndex::new(self.read_u8()?))
    }

    // -------------------------------------------------------------------------
    // Entity references
    // -------------------------------------------------------------------------

    fn read_serial(&mut self) -> Result<Serial> {
        Ok(Serial::new(self.read_i32()?))
    }

    fn read_item(&mut self) -> Result<Option<<Self::Resolver as EntityResolver>::Item>> {
        let serial = self.read_serial()?;
        Ok(if serial.is_null() { None } else { self.resolver().find_item(serial) })
    }

    fn read_actor(&mut self) -> Result<Option<<Self::Resolver as EntityResolver>::Actor>> {
        let serial = self.read_serial()?;
        Ok(if serial.is_null() { None } else { self.resolver().find_actor(serial) })
    }

    fn read_group(&mut self) -> Result<Option<<Self::Resolver as EntityResolver>::Group>> {
        let serial = self.read_serial()?;
        Ok(if serial.is_null() { None } else { self.resolver().find_group(serial) })
    }

    // -------------------------------------------------------------------------
    // Entity collections
    // -------------------------------------------------------------------------

    /// Read a collection count
    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count)
            .map_err(|_| PersistError::Malformed(format!("negative collection count {}", count)))
    }

    /// Items that no longer resolve are skipped
    fn read_item_list_or_null(&mut self) -> Result<Option<Vec<<Self::Resolver as EntityResolver>::Item>>> {
        let count = self.read_count()?;
        if count == 0 {
            return Ok(None);
        }

        let mut list = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        for _ in 0..count {
            if let Some(item) = self.read_item()? {
                list.push(item);
            }
        }
        Ok(Some(list))
    }

    fn read_item_list(&mut self) -> Result<Vec<<Self::Resolver as EntityResolver>::Item>> {
        Ok(self.read_item_list_or_null()?.unwrap_or_default())
    }

    fn read_actor_list_or_null(&mut self) -> Result<Option<Vec<<Self::Resolver as EntityResolver>::Actor>>> {
        let count = self.read_count()?;
        if count == 0 {
            return Ok(None);
        }

        let mut list = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        for _ in 0..count {
            if let Some(actor) = self.read_actor()? {
                list.push(actor);
            }
        }
        Ok(Some(list))
    }

    fn read_actor_list(&mut self) -> Result<Vec<<Self::Resolver as EntityResolver>::Actor>> {
        Ok(self.read_actor_list_or_null()?.unwrap_or_default())
    }

    fn read_group_list_or_null(&mut self) -> Result<Option<Vec<<Self::Resolver as EntityResolver>::Group>>> {
        let count = self.read_count()?;
        if count == 0 {
            return Ok(None);
        }

        let mut list = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        for _ in 0..count {
            if let Some(group) = self.read_group()? {
                list.push(group);
            }
        }
        Ok(Some(list))
    }

    fn read_group_list(&mut self) -> Result<Vec<<Self::Resolver as EntityResolver>::Group>> {
        Ok(self.read_group_list_or_null()?.unwrap_or_default())
    }
}
