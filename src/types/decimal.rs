//! High-precision decimal
//!
//! A 96-bit unsigned mantissa with a sign and a power-of-ten scale. On the
//! wire it is four i32 components: `lo`, `mid`, `hi`, `flags`.
//!
//! ```text
//! flags: ┌──────┬─────────┬────────────┬───────────┐
//!        │ sign │ 0 (7)   │ scale (8)  │ 0 (16)    │
//!        │ b31  │ b24-30  │ b16-23     │ b0-15     │
//!        └──────┴─────────┴────────────┴───────────┘
//! ```

use std::fmt;

/// Largest supported scale
pub const MAX_SCALE: u8 = 28;

const SIGN_MASK: u32 = 0x8000_0000;
const SCALE_SHIFT: u32 = 16;
const SCALE_MASK: u32 = 0x00FF_0000;
const MANTISSA_LIMIT: u128 = 1 << 96;

/// Fixed-point decimal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    flags: u32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal { lo: 0, mid: 0, hi: 0, flags: 0 };

    /// `mantissa * 10^-scale`, or `None` if the mantissa exceeds 96 bits or
    /// the scale exceeds 28
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >= MANTISSA_LIMIT || scale > MAX_SCALE {
            return None;
        }

        let mut flags = u32::from(scale) << SCALE_SHIFT;
        if mantissa < 0 {
            flags |= SIGN_MASK;
        }

        Some(Decimal {
            lo: magnitude as u32,
            mid: (magnitude >> 32) as u32,
            hi: (magnitude >> 64) as u32,
            flags,
        })
    }

    /// Rebuild from the four wire components, rejecting invalid flags
    pub fn from_parts(parts: [i32; 4]) -> Option<Self> {
        let flags = parts[3] as u32;
        let scale = (flags & SCALE_MASK) >> SCALE_SHIFT;
        if flags & !(SIGN_MASK | SCALE_MASK) != 0 || scale > u32::from(MAX_SCALE) {
            return None;
        }

        Some(Decimal {
            lo: parts[0] as u32,
            mid: parts[1] as u32,
            hi: parts[2] as u32,
            flags,
        })
    }

    /// The four wire components in stream order
    pub fn to_parts(self) -> [i32; 4] {
        [self.lo as i32, self.mid as i32, self.hi as i32, self.flags as i32]
    }

    pub fn scale(self) -> u8 {
        ((self.flags & SCALE_MASK) >> SCALE_SHIFT) as u8
    }

    pub fn is_sign_negative(self) -> bool {
        self.flags & SIGN_MASK != 0
    }

    /// Signed mantissa
    pub fn mantissa(self) -> i128 {
        let magnitude = (u128::from(self.hi) << 64) | (u128::from(self.mid) << 32) | u128::from(self.lo);
        if self.is_sign_negative() {
            -(magnitude as i128)
        } else {
            magnitude as i128
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().unsigned_abs().to_string();
        let scale = usize::from(self.scale());
        let sign = if self.is_sign_negative() { "-" } else { "" };

        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }

        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}
