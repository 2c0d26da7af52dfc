//! Box representations and per-call coordinate adjustments.
//!
//! All arithmetic stays in normalized space. Adjustments are applied in a
//! fixed order: size scaling, vertical offset, then flips. Pixel conversion
//! is a separate step for consumers that need it.

use crate::bbox::{CenterBox, Corners};
use crate::util::{DetDecodeError, DetDecodeResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Output box representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
    /// `(x1, y1, x2, y2)`.
    Corner,
    /// `(x1, y1, width, height)`.
    #[serde(rename = "topleft")]
    TopLeft,
    /// `(cx, cy, width / 2, height / 2)`.
    HalfExtents,
    /// `(cx, cy, width, height)`.
    #[default]
    Center,
}

impl BoxFormat {
    /// Returns the configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            BoxFormat::Corner => "corner",
            BoxFormat::TopLeft => "topleft",
            BoxFormat::HalfExtents => "half_extents",
            BoxFormat::Center => "center",
        }
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoxFormat {
    type Err = DetDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "corner" => Ok(BoxFormat::Corner),
            "topleft" => Ok(BoxFormat::TopLeft),
            "half_extents" => Ok(BoxFormat::HalfExtents),
            "center" => Ok(BoxFormat::Center),
            _ => Err(DetDecodeError::InvalidConfig(
                "output_format must be corner, topleft, half_extents or center",
            )),
        }
    }
}

/// Adjustments applied to a box before it changes representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxAdjust {
    /// Width multiplier.
    pub width_scale: f32,
    /// Height multiplier.
    pub height_scale: f32,
    /// Added to the vertical center; positive moves the box down.
    pub y_offset: f32,
    /// Mirror the horizontal center (`1 - cx`).
    pub flip_x: bool,
    /// Mirror the vertical center (`1 - cy`).
    pub flip_y: bool,
}

impl Default for BoxAdjust {
    fn default() -> Self {
        Self {
            width_scale: 1.0,
            height_scale: 1.0,
            y_offset: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl BoxAdjust {
    /// Returns true when the adjustment leaves boxes unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Checks that all factors are finite.
    pub fn validate(&self) -> DetDecodeResult<()> {
        if !self.width_scale.is_finite()
            || !self.height_scale.is_finite()
            || !self.y_offset.is_finite()
        {
            return Err(DetDecodeError::InvalidConfig(
                "box adjustments must be finite",
            ));
        }
        Ok(())
    }

    /// Applies scale, offset and flips. Extents never go below zero.
    pub fn apply(&self, b: &CenterBox) -> CenterBox {
        let w = (b.w * self.width_scale).max(0.0);
        let h = (b.h * self.height_scale).max(0.0);
        let mut cx = b.cx;
        let mut cy = b.cy + self.y_offset;
        if self.flip_x {
            cx = 1.0 - cx;
        }
        if self.flip_y {
            cy = 1.0 - cy;
        }
        CenterBox { cx, cy, w, h }
    }

    /// Reverses scale and offset on an adjusted box.
    ///
    /// Flips are not undone and extents clamped to zero stay zero. A zero
    /// scale factor leaves the extent untouched.
    pub fn undo(&self, b: &CenterBox) -> CenterBox {
        let unscale = |v: f32, s: f32| if s == 0.0 { v } else { v / s };
        CenterBox {
            cx: b.cx,
            cy: b.cy - self.y_offset,
            w: unscale(b.w, self.width_scale),
            h: unscale(b.h, self.height_scale),
        }
    }
}

/// Box in the caller-selected representation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OutputBox {
    pub format: BoxFormat,
    pub values: [f32; 4],
}

impl OutputBox {
    /// Recovers the (adjusted) center form from any representation.
    pub fn to_center(&self) -> CenterBox {
        let [a, b, c, d] = self.values;
        match self.format {
            BoxFormat::Corner => Corners {
                x1: a,
                y1: b,
                x2: c,
                y2: d,
            }
            .to_center(),
            BoxFormat::TopLeft => CenterBox::new(a + c / 2.0, b + d / 2.0, c, d),
            BoxFormat::HalfExtents => CenterBox::new(a, b, c * 2.0, d * 2.0),
            BoxFormat::Center => CenterBox::new(a, b, c, d),
        }
    }
}

/// Adjusts a normalized center box and converts it to `format`.
pub fn transform_box(b: &CenterBox, format: BoxFormat, adjust: &BoxAdjust) -> OutputBox {
    let b = adjust.apply(b);
    let values = match format {
        BoxFormat::Corner => b.to_corners().to_array(),
        BoxFormat::TopLeft => {
            let c = b.to_corners();
            [c.x1, c.y1, b.w, b.h]
        }
        BoxFormat::HalfExtents => [b.cx, b.cy, b.w / 2.0, b.h / 2.0],
        BoxFormat::Center => b.to_array(),
    };
    OutputBox { format, values }
}

/// Center-form box in pixel units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Scales a normalized center box to a `width` x `height` frame.
pub fn to_pixels(b: &CenterBox, width: u32, height: u32) -> PixelBox {
    let (fw, fh) = (width as f32, height as f32);
    PixelBox {
        cx: b.cx * fw,
        cy: b.cy * fh,
        w: b.w * fw,
        h: b.h * fh,
    }
}
