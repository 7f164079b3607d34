use serde::{Deserialize, Serialize};

/// Affine pixel-to-world transform in GDAL coefficient order.
///
/// ```text
/// [0] x of the upper-left corner    [3] y of the upper-left corner
/// [1] pixel width (a)               [4] column rotation (d)
/// [2] row rotation (b)              [5] pixel height (e), negative for north-up
/// ```
///
/// `world_x = gt[0] + col * gt[1] + row * gt[2]`,
/// `world_y = gt[3] + col * gt[4] + row * gt[5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform(pub [f64; 6]);

impl AffineTransform {
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    /// Pixel width in world units (`a`). Sign is kept.
    pub fn resolution_x(&self) -> f64 {
        self.0[1]
    }

    /// Absolute pixel height in world units (`|e|`).
    pub fn resolution_y(&self) -> f64 {
        self.0[5].abs()
    }

    /// True when both resolutions are finite and non-zero.
    pub fn is_valid(&self) -> bool {
        let (rx, ry) = (self.resolution_x(), self.resolution_y());
        rx.is_finite() && ry.is_finite() && rx != 0.0 && ry != 0.0
    }

    /// Map a pixel/line coordinate to world coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.0;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// Transform of a window whose top-left pixel is `(x_off, y_off)`.
    ///
    /// Only the origin moves; scale and rotation terms are carried over.
    pub fn window_transform(&self, x_off: usize, y_off: usize) -> Self {
        let (x, y) = self.apply(x_off as f64, y_off as f64);
        let mut gt = self.0;
        gt[0] = x;
        gt[3] = y;
        Self(gt)
    }
}

impl From<[f64; 6]> for AffineTransform {
    fn from(value: [f64; 6]) -> Self {
        Self(value)
    }
}
