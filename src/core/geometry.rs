//! 2D vector math shared by the layout simulation, edge geometry and minimap.

use serde::{Deserialize, Serialize};

/// 2D point or vector in world (or screen) coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len < 0.0001 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    pub fn add(&self, other: Vec2) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(&self, other: Vec2) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Counter-clockwise perpendicular
    pub fn perp(&self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        self.sub(other).length()
    }

    pub fn midpoint(&self, other: Vec2) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl From<(f64, f64)> for Vec2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Axis-aligned rectangle described by its centre and size
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vec2,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(center: Vec2, width: f64, height: f64) -> Self {
        Self {
            center,
            width,
            height,
        }
    }

    /// Build from two opposite corners in any order
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = Vec2::new(a.x.min(b.x), a.y.min(b.y));
        let max = Vec2::new(a.x.max(b.x), a.y.max(b.y));
        Self::new(min.midpoint(max), max.x - min.x, max.y - min.y)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(
            self.center.x - self.width / 2.0,
            self.center.y - self.height / 2.0,
        )
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(
            self.center.x + self.width / 2.0,
            self.center.y + self.height / 2.0,
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        Rect::from_corners(
            Vec2::new(a_min.x.min(b_min.x), a_min.y.min(b_min.y)),
            Vec2::new(a_max.x.max(b_max.x), a_max.y.max(b_max.y)),
        )
    }

    /// Half of the diagonal, i.e. the radius of the circumscribed circle
    pub fn half_diagonal(&self) -> f64 {
        (self.width * self.width + self.height * self.height).sqrt() / 2.0
    }
}
