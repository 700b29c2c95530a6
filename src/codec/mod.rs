//! Primitive Codec
//!
//! Byte-level encode/decode rules shared by every writer and reader. Nothing
//! in here performs I/O: encoders append to a `bytes::BufMut`, decoders pull
//! bytes from a caller-supplied source.
//!
//! ## Wire Rules
//! - Fixed-width integers and floats: little-endian (`to_le_bytes`)
//! - Encoded int: 7 data bits per byte, low group first, high bit = more
//! - String: encoded byte length + UTF-8 bytes (optional presence byte first)
//! - Char: UTF-8, one code point
//! - Decimal: four i32 components (see [`crate::types::Decimal`])
//! - IPv4 address: i64 whose low 32 bits are the octets read little-endian

mod text;
mod varint;

pub use text::{put_char, string_chunks, utf8_len_from_lead, StringChunks};
pub use text::{MAX_CHUNK_CHARS, MAX_UTF8_CHAR_LEN, STAGING_BUFFER_SIZE};
pub use varint::{decode_encoded_int, encoded_int_len, put_encoded_int, MAX_ENCODED_INT_LEN};

use std::net::Ipv4Addr;

/// Wire form of an IPv4 address
pub fn ip_to_wire(addr: Ipv4Addr) -> i64 {
    i64::from(u32::from_le_bytes(addr.octets()))
}

/// Rebuild an IPv4 address, or `None` if bits above the low 32 are set
pub fn ip_from_wire(value: i64) -> Option<Ipv4Addr> {
    let low = u32::try_from(value).ok()?;
    Some(Ipv4Addr::from(low.to_le_bytes()))
}
