//! Rectangles in buffer space and in image space.
//!
//! - [`Rect`] - unsigned origin + size, always relative to one buffer
//!   (pixel regions, tiles, crop boxes)
//! - [`Bounds`] - signed half-open box `[x1, x2) x [y1, y2)` in image
//!   coordinates, where a buffer's offsets may be negative
//!
//! # Coordinate System
//!
//! ```text
//! (0,0) ────────► X
//!   │
//!   │   ┌──────────┐
//!   │   │  Region  │
//!   │   └──────────┘
//!   ▼
//!   Y
//! ```
//!
//! ```rust
//! use rastile_core::Rect;
//!
//! let a = Rect::new(0, 0, 100, 100);
//! let b = Rect::new(50, 50, 100, 100);
//! assert_eq!(a.intersect(&b), Some(Rect::new(50, 50, 50, 50)));
//! ```

/// A rectangle defined by origin (x, y) and dimensions (width, height).
///
/// Left/top edges are inclusive, right/bottom edges exclusive. A zero
/// width or height makes the rectangle empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// X coordinate of the left edge (inclusive)
    pub x: u32,
    /// Y coordinate of the top edge (inclusive)
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle with the given origin and dimensions.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle at the origin.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Creates a rectangle from inclusive min and exclusive max corners,
    /// normalizing swapped inputs.
    #[inline]
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        let (min_x, max_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (min_y, max_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Area in pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if the point (px, py) is inside this rectangle.
    #[inline]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Returns `true` if this rectangle fully contains another.
    ///
    /// Uses widened arithmetic, so rectangles whose far edge would
    /// overflow `u32` are reported as not contained.
    #[inline]
    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x as u64 + other.width as u64 <= self.x as u64 + self.width as u64
            && other.y as u64 + other.height as u64 <= self.y as u64 + self.height as u64
    }

    /// Returns the intersection of this rectangle with another.
    ///
    /// Returns `None` if the rectangles don't overlap.
    #[inline]
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// Returns the bounding box that contains both rectangles.
    #[inline]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Grows the rectangle by `amount` on every side, saturating at zero.
    #[inline]
    pub fn expand(&self, amount: u32) -> Rect {
        let x = self.x.saturating_sub(amount);
        let y = self.y.saturating_sub(amount);
        Rect::new(
            x,
            y,
            self.right() + amount - x,
            self.bottom() + amount - y,
        )
    }

    /// Iterates all (x, y) coordinates row by row.
    #[inline]
    pub fn iter_coords(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.bottom()).flat_map(move |y| (self.x..self.right()).map(move |x| (x, y)))
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Half-open box `[x1, x2) x [y1, y2)` in image coordinates.
///
/// Used for the placement of a tiled buffer inside its parent image
/// (see [`TileManager::bounds`](crate::TileManager::bounds)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Left edge (inclusive)
    pub x1: i32,
    /// Top edge (inclusive)
    pub y1: i32,
    /// Right edge (exclusive)
    pub x2: i32,
    /// Bottom edge (exclusive)
    pub y2: i32,
}

impl Bounds {
    /// Creates a box from its edges.
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Creates a box from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width as i32, y + height as i32)
    }

    /// Width, zero for inverted boxes.
    #[inline]
    pub const fn width(&self) -> u32 {
        if self.x2 > self.x1 { (self.x2 - self.x1) as u32 } else { 0 }
    }

    /// Height, zero for inverted boxes.
    #[inline]
    pub const fn height(&self) -> u32 {
        if self.y2 > self.y1 { (self.y2 - self.y1) as u32 } else { 0 }
    }

    /// Returns `true` if the box covers no pixel.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// Returns `true` if (x, y) lies inside the box.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Intersection of two boxes, `None` when they do not overlap.
    #[inline]
    pub fn intersect(&self, other: &Bounds) -> Option<Bounds> {
        let b = Bounds::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );
        if b.is_empty() { None } else { Some(b) }
    }

    /// Returns this box relative to `origin`, as a buffer rectangle.
    ///
    /// The box must not start left of or above `origin`.
    #[inline]
    pub fn to_rect(&self, origin_x: i32, origin_y: i32) -> Rect {
        debug_assert!(self.x1 >= origin_x && self.y1 >= origin_y);
        Rect::new(
            (self.x1 - origin_x) as u32,
            (self.y1 - origin_y) as u32,
            self.width(),
            self.height(),
        )
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}) x [{}, {})", self.x1, self.x2, self.y1, self.y2)
    }
}
