//! Normalized region geometry, used for camera zones and `InZone` conditions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A normalized rectangle (0.0 to 1.0) representing a relative region of a
/// frame, independent of the frame's pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Valid if non-degenerate and within frame bounds (small epsilon for
    /// float precision at the edges).
    pub fn is_valid(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.001
            && self.y + self.height <= 1.001
    }

    /// Whether a normalized point falls inside this rectangle.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}
