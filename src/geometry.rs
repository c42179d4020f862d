//! Logo placement geometry shared by both compositors
//!
//! All math is in abstract f64 units so the same formulas serve pixel space
//! (raster compositor) and viewBox space (vector compositor). The constants
//! come from the placement contract: padding is 10% of the logo width and the
//! rounded-square corner radius is 20%.

use serde::{Deserialize, Serialize};

/// Supported logo container shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogoShape {
    Square,
    RoundedSquare,
    Circle,
}

/// Square placement box for a logo, centered on the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

impl LogoBox {
    /// Centered box covering `fraction` of a square canvas
    pub fn centered(canvas: f64, fraction: f64) -> Self {
        let width = canvas * fraction;
        let x = (canvas - width) / 2.0;
        Self { x, y: x, width }
    }

    /// Padding ring around the box (10% of the logo width)
    pub fn padding(&self) -> f64 {
        self.width * 0.1
    }

    /// Corner radius for the rounded-square shape (20% of the logo width)
    pub fn corner_radius(&self) -> f64 {
        self.width * 0.2
    }

    /// Box grown by `pad` on every side
    pub fn expanded(&self, pad: f64) -> Self {
        Self {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + pad * 2.0,
        }
    }

    /// Map a pixel-space box into another coordinate space
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.width / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.width
    }

    /// Whether the box (including its edges) lies within `[0, canvas]²`
    pub fn fits_within(&self, canvas: f64) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= canvas && self.bottom() <= canvas
    }
}

impl LogoShape {
    /// Signed distance from `(px, py)` to the shape boundary over `b`;
    /// negative inside. `corner_radius` only affects `RoundedSquare`.
    pub fn signed_distance(&self, b: &LogoBox, corner_radius: f64, px: f64, py: f64) -> f64 {
        let (cx, cy) = b.center();
        let half = b.width / 2.0;
        match self {
            LogoShape::Circle => {
                let dx = px - cx;
                let dy = py - cy;
                (dx * dx + dy * dy).sqrt() - half
            }
            LogoShape::Square => rect_distance(px - cx, py - cy, half, half),
            LogoShape::RoundedSquare => {
                let r = corner_radius.min(half);
                rect_distance(px - cx, py - cy, half - r, half - r) - r
            }
        }
    }

    /// Antialiased coverage of the pixel centered at `(px, py)`, in `[0, 1]`
    pub fn coverage(&self, b: &LogoBox, corner_radius: f64, px: f64, py: f64) -> f64 {
        (0.5 - self.signed_distance(b, corner_radius, px, py)).clamp(0.0, 1.0)
    }
}

/// Distance to an axis-aligned rectangle centered at the origin with the
/// given half extents
fn rect_distance(dx: f64, dy: f64, hx: f64, hy: f64) -> f64 {
    let qx = dx.abs() - hx;
    let qy = dy.abs() - hy;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0)
}
