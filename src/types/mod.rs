//! Value Types
//!
//! Plain values that have a fixed encoding in the stream.
//!
//! | Type          | Encoding                                   |
//! |---------------|--------------------------------------------|
//! | `Serial`      | i32, `-1` = null/deleted                   |
//! | `Timestamp`   | i64 ticks (absolute) or i64 delta ticks    |
//! | `TimeSpan`    | i64 ticks                                  |
//! | `Decimal`     | four i32: lo, mid, hi, flags               |
//! | `Point2D`     | i32 x, i32 y                               |
//! | `Point3D`     | i32 x, i32 y, i32 z                        |
//! | `Rectangle2D` | Point2D start, Point2D end                 |
//! | `MapIndex`    | u8, `0xFF` = no map                        |

mod decimal;
mod geometry;
mod serial;
mod time;

pub use decimal::Decimal;
pub use geometry::{MapIndex, Point2D, Point3D, Rectangle2D};
pub use serial::Serial;
pub use time::{Clock, FixedClock, SystemClock, TimeSpan, Timestamp};
