//! Normalized box primitives shared by the decode stages.

use serde::Serialize;

/// Box in normalized center form `(cx, cy, w, h)`.
///
/// Values are nominally in `[0, 1]` but are never clamped; network output
/// may extend slightly past the frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CenterBox {
    /// Horizontal center.
    pub cx: f32,
    /// Vertical center.
    pub cy: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl CenterBox {
    /// Creates a center-form box.
    pub fn new(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self { cx, cy, w, h }
    }

    /// Returns the box as `[cx, cy, w, h]`.
    pub fn to_array(self) -> [f32; 4] {
        [self.cx, self.cy, self.w, self.h]
    }

    /// Converts to corner form.
    pub fn to_corners(self) -> Corners {
        Corners::from_center(&self)
    }
}

/// Box in corner form `(x1, y1, x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Corners {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Corners {
    /// Converts a center-form box without clamping.
    pub fn from_center(b: &CenterBox) -> Self {
        let half_w = b.w / 2.0;
        let half_h = b.h / 2.0;
        Self {
            x1: b.cx - half_w,
            y1: b.cy - half_h,
            x2: b.cx + half_w,
            y2: b.cy + half_h,
        }
    }

    /// Converts back to center form.
    pub fn to_center(self) -> CenterBox {
        CenterBox {
            cx: (self.x1 + self.x2) / 2.0,
            cy: (self.y1 + self.y2) / 2.0,
            w: self.x2 - self.x1,
            h: self.y2 - self.y1,
        }
    }

    /// Signed area; negative when exactly one extent is inverted.
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    /// Returns the box as `[x1, y1, x2, y2]`.
    pub fn to_array(self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}
