#![forbid(unsafe_code)]

//! Geometric primitives and layout inputs.
//!
//! All values are logical points (`f32`) with the origin at the top-left of
//! the parent view.

use serde::{Deserialize, Serialize};

/// A point in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Check if the size covers no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self {
            origin: Point::ZERO,
            size,
        }
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.origin.x + self.size.width
    }

    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.height
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// Smallest rectangle containing both.
    ///
    /// An empty rectangle does not contribute to the union.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.origin.x.min(other.origin.x);
        let y = self.origin.y.min(other.origin.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Same rectangle translated by `offset`.
    #[inline]
    pub fn offset_by(&self, offset: Point) -> Rect {
        Rect {
            origin: self.origin + offset,
            size: self.size,
        }
    }
}

/// Writing direction used by layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    #[default]
    Undefined,
    LeftToRight,
    RightToLeft,
}

/// Whether a node takes part in layout and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    None,
    #[default]
    Flex,
    Inline,
}

/// Size bounds a surface is laid out within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConstraints {
    pub minimum_size: Size,
    pub maximum_size: Size,
    pub layout_direction: LayoutDirection,
}

impl Default for LayoutConstraints {
    fn default() -> Self {
        Self {
            minimum_size: Size::ZERO,
            maximum_size: Size::new(f32::INFINITY, f32::INFINITY),
            layout_direction: LayoutDirection::Undefined,
        }
    }
}

impl LayoutConstraints {
    /// Constraints that force exactly `size`.
    pub fn exact(size: Size) -> Self {
        Self {
            minimum_size: size,
            maximum_size: size,
            layout_direction: LayoutDirection::Undefined,
        }
    }

    /// Clamp `size` into `[minimum_size, maximum_size]` per axis.
    ///
    /// The minimum wins when the bounds are inverted.
    pub fn clamp(&self, size: Size) -> Size {
        Size::new(
            size.width
                .min(self.maximum_size.width)
                .max(self.minimum_size.width),
            size.height
                .min(self.maximum_size.height)
                .max(self.minimum_size.height),
        )
    }
}

/// Environment-dependent layout inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutContext {
    pub point_scale_factor: f32,
    pub font_size_multiplier: f32,
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self {
            point_scale_factor: 1.0,
            font_size_multiplier: 1.0,
        }
    }
}

/// Layout results for a single node, as produced by the layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub frame: Rect,
    pub display_type: DisplayType,
    pub layout_direction: LayoutDirection,
    pub point_scale_factor: f32,
}

impl LayoutMetrics {
    /// Metrics of a node that has not been laid out.
    pub const EMPTY: LayoutMetrics = LayoutMetrics {
        frame: Rect::ZERO,
        display_type: DisplayType::Flex,
        layout_direction: LayoutDirection::Undefined,
        point_scale_factor: 1.0,
    };

    /// Metrics with the given frame and defaults elsewhere.
    pub const fn with_frame(frame: Rect) -> Self {
        Self {
            frame,
            ..Self::EMPTY
        }
    }
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self::EMPTY
    }
}
