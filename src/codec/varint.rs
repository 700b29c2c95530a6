//! Variable-length integers
//!
//! ```text
//!   value 300 = 0b1_0010_1100
//!   ┌──────────────┬──────────────┐
//!   │ 1 0101100    │ 0 0000010    │
//!   │ more | low 7 │ last | next 7│
//!   └──────────────┴──────────────┘
//!        0xAC            0x02
//! ```

use bytes::BufMut;

use crate::error::{PersistError, Result};

/// Longest encoding of a 32-bit value
pub const MAX_ENCODED_INT_LEN: usize = 5;

/// Append `value` as an encoded int (reinterpreted as unsigned first)
pub fn put_encoded_int<B: BufMut>(buf: &mut B, value: i32) {
    let mut v = value as u32;
    while v >= 0x80 {
        buf.put_u8((v as u8) | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Number of bytes `put_encoded_int` emits for `value`
pub fn encoded_int_len(value: i32) -> usize {
    let v = value as u32;
    match v {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Decode an encoded int, pulling bytes from `next_byte`
///
/// Fails with `Malformed` if the encoding runs past five bytes or sets bits
/// above bit 31; errors from `next_byte` (e.g. end of stream) propagate.
pub fn decode_encoded_int<F>(mut next_byte: F) -> Result<i32>
where
    F: FnMut() -> Result<u8>,
{
    let mut value: u32 = 0;
    let mut shift = 0;

    loop {
        let byte = next_byte()?;

        if shift == 28 && byte > 0x0F {
            return Err(PersistError::Malformed(format!(
                "encoded int overflows 32 bits (fifth byte 0x{:02x})",
                byte
            )));
        }

        value |= u32::from(byte & 0x7F) << shift;
        if byte < 0x80 {
            return Ok(value as i32);
        }
        shift += 7;
    }
}
