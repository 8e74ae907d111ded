//! # Court model
//!
//! The court is located from the four corners of a calibration marker placed at the left end of
//! the net line. Corner `D` sits on the net line at the left sideline, `A` lies further along the
//! net line and `C` lies along the left sideline towards the back of the court. All other
//! reference points are derived from those two directions and the court dimensions.
//!
//! Once locked the court never changes for the rest of the session.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::{fmt, fs::File, io::BufReader, path::Path};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum marker edge length below which the corners cannot define directions.
const MIN_MARKER_EDGE: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Court dimensions and calibration storage.
#[derive(Debug, Clone, Deserialize)]
pub struct CourtParams {
    /// Width of the court along the net line in metres
    pub width_m: f64,

    /// Length from the net to the back boundary line in metres
    pub length_m: f64,

    /// Distance from the net to the short service line in metres
    pub short_service_m: f64,

    /// World units per metre
    pub scale: f64,

    /// Path of the calibration record, relative to the software root
    pub calibration_path: String,
}

/// The persisted court calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Marker corners A, B, C, D
    pub corners: [[f64; 3]; 4],

    /// Depth of the court plane
    pub court_depth: f64,
}

/// The named reference points of the court.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourtPoints {
    pub net_left: Vector3<f64>,
    pub net_right: Vector3<f64>,
    pub serve_left_front: Vector3<f64>,
    pub serve_centre_front: Vector3<f64>,
    pub serve_right_front: Vector3<f64>,
    pub serve_left_back: Vector3<f64>,
    pub serve_centre_back: Vector3<f64>,
    pub serve_right_back: Vector3<f64>,
}

/// The badminton court.
#[derive(Debug, Clone)]
pub struct Court {
    points: CourtPoints,

    corners: [[f64; 3]; 4],

    depth: f64,

    locked: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Court boundaries which can be demonstrated to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bounds {
    Left,
    Right,
    Full,
}

/// The service court a serve must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServeSide {
    Left,
    Right,
}

#[derive(Debug, thiserror::Error)]
pub enum CourtError {
    #[error("The court is locked and cannot be updated")]
    Locked,

    #[error("The court marker corners are degenerate: {0:?}")]
    DegenerateCorners([[f64; 3]; 4]),

    #[error("Could not open the calibration record: {0}")]
    RecordIoError(std::io::Error),

    #[error("Could not (de)serialise the calibration record: {0}")]
    RecordSerdeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Court {
    /// Build an unlocked court from the four marker corners (A, B, C, D).
    pub fn from_markers(corners: &[[f64; 3]; 4], params: &CourtParams) -> Result<Self, CourtError> {
        let depth = corners.iter().map(|c| c[2]).sum::<f64>() / 4.0;
        let points = calc_points(corners, depth, params)?;

        Ok(Self {
            points,
            corners: *corners,
            depth,
            locked: false,
        })
    }

    /// Build a locked court from a calibration record.
    pub fn from_record(record: &CalibrationRecord, params: &CourtParams) -> Result<Self, CourtError> {
        let points = calc_points(&record.corners, record.court_depth, params)?;

        Ok(Self {
            points,
            corners: record.corners,
            depth: record.court_depth,
            locked: true,
        })
    }

    /// Recompute the court from a new marker detection. Fails once the court is locked.
    pub fn update_from_markers(
        &mut self,
        corners: &[[f64; 3]; 4],
        params: &CourtParams,
    ) -> Result<(), CourtError> {
        if self.locked {
            return Err(CourtError::Locked);
        }

        *self = Self::from_markers(corners, params)?;
        Ok(())
    }

    /// Lock the court, freezing its reference points.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn points(&self) -> &CourtPoints {
        &self.points
    }

    /// Depth of the court plane.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// The record to persist for this court.
    pub fn record(&self) -> CalibrationRecord {
        CalibrationRecord {
            corners: self.corners,
            court_depth: self.depth,
        }
    }

    /// Returns true if the point lies in the full court (boundary inclusive).
    pub fn is_inside(&self, p: &Vector3<f64>) -> bool {
        let c = &self.points;
        in_convex_quad(
            [c.net_left, c.net_right, c.serve_right_back, c.serve_left_back],
            p,
        )
    }

    /// Returns true if the point lies in the service court of the given side.
    ///
    /// Service courts run from the short service line to the back boundary line.
    pub fn in_service_court(&self, side: ServeSide, p: &Vector3<f64>) -> bool {
        let c = &self.points;
        let quad = match side {
            ServeSide::Left => [
                c.serve_left_front,
                c.serve_centre_front,
                c.serve_centre_back,
                c.serve_left_back,
            ],
            ServeSide::Right => [
                c.serve_centre_front,
                c.serve_right_front,
                c.serve_right_back,
                c.serve_centre_back,
            ],
        };
        in_convex_quad(quad, p)
    }

    /// The closed sequence of reference points that traces the given boundary.
    pub fn tour(&self, bounds: Bounds) -> Vec<Vector3<f64>> {
        let c = &self.points;
        match bounds {
            Bounds::Left => vec![
                c.serve_left_front,
                c.serve_centre_front,
                c.serve_centre_back,
                c.serve_left_back,
                c.serve_left_front,
            ],
            Bounds::Right => vec![
                c.serve_centre_front,
                c.serve_right_front,
                c.serve_right_back,
                c.serve_centre_back,
                c.serve_centre_front,
            ],
            Bounds::Full => vec![
                c.net_left,
                c.net_right,
                c.serve_right_back,
                c.serve_left_back,
                c.net_left,
            ],
        }
    }
}

impl CalibrationRecord {
    /// Load the record from the given path, `None` if no record has been saved yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>, CourtError> {
        if !path.as_ref().exists() {
            return Ok(None);
        }

        let file = File::open(path).map_err(CourtError::RecordIoError)?;
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(CourtError::RecordSerdeError)
    }

    /// Save the record to the given path, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CourtError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(CourtError::RecordIoError)?;
        }

        let file = File::create(path).map_err(CourtError::RecordIoError)?;
        serde_json::to_writer_pretty(file, self).map_err(CourtError::RecordSerdeError)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bounds::Left => write!(f, "left service court"),
            Bounds::Right => write!(f, "right service court"),
            Bounds::Full => write!(f, "full court"),
        }
    }
}

impl ServeSide {
    /// Serve side for the given round, right on even rounds and left on odd ones.
    pub fn for_round(round: u32) -> Self {
        if round % 2 == 0 {
            ServeSide::Right
        } else {
            ServeSide::Left
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn calc_points(
    corners: &[[f64; 3]; 4],
    depth: f64,
    params: &CourtParams,
) -> Result<CourtPoints, CourtError> {
    let [a, _, c, d] = *corners;
    let d_v = Vector3::new(d[0], d[1], depth);

    // Planar directions along the net line and down the sideline
    let u = Vector3::new(a[0] - d[0], a[1] - d[1], 0.0);
    let v = Vector3::new(c[0] - d[0], c[1] - d[1], 0.0);
    if u.norm() < MIN_MARKER_EDGE || v.norm() < MIN_MARKER_EDGE {
        return Err(CourtError::DegenerateCorners(*corners));
    }
    let u = u.normalize();
    let v = v.normalize();

    let w = params.width_m * params.scale;
    let l = params.length_m * params.scale;
    let s = params.short_service_m * params.scale;

    let at = |across: f64, down: f64| d_v + across * u + down * v;

    Ok(CourtPoints {
        net_left: at(0.0, 0.0),
        net_right: at(w, 0.0),
        serve_left_front: at(0.0, s),
        serve_centre_front: at(w / 2.0, s),
        serve_right_front: at(w, s),
        serve_left_back: at(0.0, l),
        serve_centre_back: at(w / 2.0, l),
        serve_right_back: at(w, l),
    })
}

/// Planar containment in a convex quadrilateral given in either winding, boundary inclusive.
fn in_convex_quad(quad: [Vector3<f64>; 4], p: &Vector3<f64>) -> bool {
    let mut pos = false;
    let mut neg = false;

    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);

        if cross > 1e-9 {
            pos = true;
        } else if cross < -1e-9 {
            neg = true;
        }
    }

    !(pos && neg)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Court params at 100 units per metre, so a 518 x 670 court.
    pub(crate) fn params() -> CourtParams {
        CourtParams {
            width_m: 5.18,
            length_m: 6.7,
            short_service_m: 1.98,
            scale: 100.0,
            calibration_path: String::from("data/court_calibration.json"),
        }
    }

    /// Marker with D at (100, 50), A along +x and C along +y.
    pub(crate) fn corners() -> [[f64; 3]; 4] {
        [
            [120.0, 50.0, 2000.0],
            [120.0, 70.0, 2002.0],
            [100.0, 70.0, 2000.0],
            [100.0, 50.0, 1998.0],
        ]
    }

    fn approx(a: &Vector3<f64>, b: [f64; 2]) -> bool {
        (a.x - b[0]).abs() < 1e-9 && (a.y - b[1]).abs() < 1e-9
    }

    #[test]
    fn test_points() {
        let court = Court::from_markers(&corners(), &params()).unwrap();
        let p = court.points();

        assert_eq!(court.depth(), 2000.0);
        assert!(approx(&p.net_left, [100.0, 50.0]));
        assert!(approx(&p.net_right, [618.0, 50.0]));
        assert!(approx(&p.serve_left_front, [100.0, 248.0]));
        assert!(approx(&p.serve_centre_front, [359.0, 248.0]));
        assert!(approx(&p.serve_right_back, [618.0, 720.0]));
        assert_eq!(p.serve_centre_back.z, 2000.0);
    }

    #[test]
    fn test_is_inside() {
        let court = Court::from_markers(&corners(), &params()).unwrap();

        assert!(court.is_inside(&Vector3::new(300.0, 300.0, 0.0)));
        // Boundary is inside
        assert!(court.is_inside(&Vector3::new(100.0, 300.0, 0.0)));
        assert!(court.is_inside(&Vector3::new(618.0, 720.0, 0.0)));
        assert!(!court.is_inside(&Vector3::new(99.0, 300.0, 0.0)));
        assert!(!court.is_inside(&Vector3::new(300.0, 721.0, 0.0)));
    }

    #[test]
    fn test_is_inside_mirrored() {
        // Sideline running in -y flips the winding of the quad
        let c = [
            [120.0, 50.0, 0.0],
            [120.0, 30.0, 0.0],
            [100.0, 30.0, 0.0],
            [100.0, 50.0, 0.0],
        ];
        let court = Court::from_markers(&c, &params()).unwrap();
        assert!(court.is_inside(&Vector3::new(300.0, -300.0, 0.0)));
        assert!(!court.is_inside(&Vector3::new(300.0, 300.0, 0.0)));
    }

    #[test]
    fn test_service_courts() {
        let court = Court::from_markers(&corners(), &params()).unwrap();

        let left = Vector3::new(200.0, 500.0, 0.0);
        let right = Vector3::new(500.0, 500.0, 0.0);
        let short = Vector3::new(200.0, 100.0, 0.0);

        assert!(court.in_service_court(ServeSide::Left, &left));
        assert!(!court.in_service_court(ServeSide::Right, &left));
        assert!(court.in_service_court(ServeSide::Right, &right));
        assert!(!court.in_service_court(ServeSide::Left, &short));
        assert!(court.is_inside(&short));
    }

    #[test]
    fn test_tours_are_closed() {
        let court = Court::from_markers(&corners(), &params()).unwrap();
        for b in [Bounds::Left, Bounds::Right, Bounds::Full].iter() {
            let t = court.tour(*b);
            assert_eq!(t.len(), 5);
            assert_eq!(t.first(), t.last());
        }
        assert_eq!(court.tour(Bounds::Full)[1], court.points().net_right);
    }

    #[test]
    fn test_lock() {
        let mut court = Court::from_markers(&corners(), &params()).unwrap();
        assert!(!court.is_locked());
        court.update_from_markers(&corners(), &params()).unwrap();

        court.lock();
        let before = *court.points();
        let mut moved = corners();
        moved[3][0] += 10.0;
        assert!(matches!(
            court.update_from_markers(&moved, &params()),
            Err(CourtError::Locked)
        ));
        assert_eq!(*court.points(), before);
    }

    #[test]
    fn test_degenerate() {
        let c = [[1.0, 1.0, 0.0]; 4];
        assert!(matches!(
            Court::from_markers(&c, &params()),
            Err(CourtError::DegenerateCorners(_))
        ));
    }

    #[test]
    fn test_record_round_trip_locks() {
        let court = Court::from_markers(&corners(), &params()).unwrap();
        let record = court.record();

        let dir = std::env::temp_dir().join(format!("birdiebot_court_{}", std::process::id()));
        let path = dir.join("court.json");
        assert_eq!(CalibrationRecord::load(&path).unwrap(), None);

        record.save(&path).unwrap();
        let loaded = CalibrationRecord::load(&path).unwrap().unwrap();
        assert_eq!(loaded, record);

        let restored = Court::from_record(&loaded, &params()).unwrap();
        assert!(restored.is_locked());
        assert_eq!(restored.points(), court.points());

        std::fs::remove_dir_all(dir).ok();
    }
}
