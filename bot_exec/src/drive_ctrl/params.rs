//! Drive control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control
#[derive(Deserialize, Debug, Clone)]
pub struct DriveParams {
    /// Bearing error below which the robot is facing the target
    pub angle_tol_rad: f64,

    /// Distance below which the target has been reached
    pub dist_tol: f64,

    /// Growth in the bearing error beyond the last turn command which triggers a new turn
    pub turn_reissue_rad: f64,

    /// Smallest change in bearing error considered material
    pub deadband_rad: f64,
}
