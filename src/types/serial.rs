//! Entity serials
//!
//! The persisted stand-in for a live object reference.

use std::fmt;

/// 32-bit signed identifier of a persisted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(i32);

impl Serial {
    /// Sentinel written for a null or deleted reference
    pub const MINUS_ONE: Serial = Serial(-1);

    pub const fn new(value: i32) -> Self {
        Serial(value)
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    /// True for the null/deleted sentinel
    pub const fn is_null(self) -> bool {
        self.0 == Self::MINUS_ONE.0
    }
}

impl From<i32> for Serial {
    fn from(value: i32) -> Self {
        Serial(value)
    }
}

impl From<Serial> for i32 {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
