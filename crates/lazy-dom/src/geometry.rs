//! Geometry
//!
//! DOMRect and the rectangle arithmetic used for intersection checks.

/// DOM rect
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DOMRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DOMRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> f32 { self.y }
    pub fn left(&self) -> f32 { self.x }
    pub fn right(&self) -> f32 { self.x + self.width }
    pub fn bottom(&self) -> f32 { self.y + self.height }

    /// Calculate intersection with another rect
    ///
    /// Edge-adjacent rects count as intersecting with a zero-area result,
    /// which is how a zero-sized target inside its root is reported.
    pub fn intersect(&self, other: &DOMRect) -> Option<DOMRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right >= x && bottom >= y {
            Some(DOMRect {
                x,
                y,
                width: right - x,
                height: bottom - y,
            })
        } else {
            None
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Grow (or, with negative values, shrink) each edge independently.
    pub fn expand(&self, top: f32, right: f32, bottom: f32, left: f32) -> DOMRect {
        DOMRect {
            x: self.x - left,
            y: self.y - top,
            width: (self.width + left + right).max(0.0),
            height: (self.height + top + bottom).max(0.0),
        }
    }

    /// Same rect moved by the given offset.
    pub fn translate(&self, dx: f32, dy: f32) -> DOMRect {
        DOMRect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}
