//! Screen geometry primitives
//!
//! Two coordinate frames exist in this crate: frame-local (relative to the
//! top-left of a captured region) and screen-absolute. They are kept as
//! distinct types so a frame-local point can never reach the input
//! synthesizer without going through [`Region::to_screen`].

use serde::{Deserialize, Serialize};

/// A screen-pixel rectangle, origin top-left.
///
/// Serialized as `[x, y, width, height]` to match the persisted config
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32, u32, u32)", into = "(i32, i32, u32, u32)")]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Create a region. Width and height must be non-zero.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalized region from two arbitrary corner points.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        let left = a.0.min(b.0);
        let top = a.1.min(b.1);
        let right = a.0.max(b.0);
        let bottom = a.1.max(b.1);
        Self::new(
            left,
            top,
            (right - left).max(1) as u32,
            (bottom - top).max(1) as u32,
        )
    }

    /// Center of the region in screen-absolute coordinates.
    pub fn center(&self) -> ScreenPoint {
        ScreenPoint {
            x: self.x + self.width as i32 / 2,
            y: self.y + self.height as i32 / 2,
        }
    }

    /// Translate a frame-local point captured from this region into a
    /// screen-absolute point.
    pub fn to_screen(&self, p: LocalPoint) -> ScreenPoint {
        ScreenPoint {
            x: p.x + self.x,
            y: p.y + self.y,
        }
    }
}

impl From<(i32, i32, u32, u32)> for Region {
    fn from(t: (i32, i32, u32, u32)) -> Self {
        Self::new(t.0, t.1, t.2, t.3)
    }
}

impl From<Region> for (i32, i32, u32, u32) {
    fn from(r: Region) -> Self {
        (r.x, r.y, r.width, r.height)
    }
}

/// A point in frame-local coordinates (relative to a captured region).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPoint {
    pub x: i32,
    pub y: i32,
}

impl LocalPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another local point.
    pub fn distance(&self, other: LocalPoint) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A point in screen-absolute coordinates. This is the only point type the
/// input synthesizer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A frame-local bounding box, as produced by OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn center(&self) -> LocalPoint {
        LocalPoint {
            x: self.x + self.width as i32 / 2,
            y: self.y + self.height as i32 / 2,
        }
    }
}
