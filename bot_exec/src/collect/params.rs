//! Collection planning parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::ClampRect;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for collection planning
#[derive(Deserialize, Debug, Clone)]
pub struct CollectParams {
    /// Region seen by the camera as `[x_min, y_min, x_max, y_max]`. Targets are clamped into it.
    pub vision_border: [f64; 4],

    /// Maximum number of legs in a single route
    pub max_route_legs: usize,

    /// Point the robot drives to before spinning out of the camera view
    pub staging_point: [f64; 3],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CollectParams {
    pub fn clamp_rect(&self) -> ClampRect {
        ClampRect {
            min: [self.vision_border[0], self.vision_border[1]],
            max: [self.vision_border[2], self.vision_border[3]],
        }
    }
}
