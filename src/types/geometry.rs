//! Points, rectangles and map indices

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point2D {
    pub x: i32,
    pub y: i32,
}

impl Point2D {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A 3D point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Point3D {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// An axis-aligned rectangle, persisted as start then end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle2D {
    pub start: Point2D,
    pub end: Point2D,
}

impl Rectangle2D {
    pub const fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    /// Horizontal extent; wraps for corners a loaded stream put far apart
    pub fn width(&self) -> i32 {
        self.end.x.wrapping_sub(self.start.x)
    }

    /// Vertical extent, wrapping like [`width`](Self::width)
    pub fn height(&self) -> i32 {
        self.end.y.wrapping_sub(self.start.y)
    }
}

/// Index into the set of known maps
///
/// The byte `0xFF` is reserved for "no map" and is never a valid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapIndex(u8);

impl MapIndex {
    /// Wire byte for "no map"
    pub const NONE_BYTE: u8 = 0xFF;

    pub fn new(index: u8) -> Option<Self> {
        (index != Self::NONE_BYTE).then_some(MapIndex(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Wire byte for an optional map
    pub fn to_byte(map: Option<MapIndex>) -> u8 {
        map.map_or(Self::NONE_BYTE, |m| m.0)
    }
}
