//! Session management
//!
//! A session owns a timestamped directory under the software root. The directory holds the log
//! file and a `records` directory into which hit and route records are written as JSON. Writing
//! happens on a background thread so that the control loop never waits on the disk.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use erased_serde::Serialize;
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the timestamp in the session directory name, see `chrono::format::strftime`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of the timestamp in record names. Milliseconds keep records of the same kind written
/// in quick succession apart.
const RECORD_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Name of the directory within the session root that records are written to.
const RECORDS_DIR: &str = "records";

/// How often the writer thread checks for a stop request while idle.
const WRITER_POLL_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Process wide session state, set once by `Session::new`.
static STATE: OnceCell<SessionState> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

type RecordData = Box<dyn Serialize + Send>;

enum WriterMsg {
    Record(PathBuf, RecordData),
    Stop,
}

struct SessionState {
    epoch: DateTime<Utc>,

    writer: Mutex<Sender<WriterMsg>>,
}

/// A running session.
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// Directory records are written into
    pub records_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    epoch: DateTime<Utc>,

    writer_tx: Sender<WriterMsg>,

    writer: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionInitError {
    #[error("The software root environment variable (BIRDIEBOT_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot create the session directory {0:?}: {1}")]
    CannotCreateDir(PathBuf, std::io::Error),

    #[error("A session has already been started in this process")]
    AlreadyStarted,

    #[error("Could not start the record writer thread: {0}")]
    WriterSpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session, creating `{sw_root}/{sessions_dir}/{exec_name}_{timestamp}`.
    ///
    /// Only one session may be started per process.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionInitError> {
        let epoch = Utc::now();

        let session_root = crate::host::get_sw_root()
            .map_err(|_| SessionInitError::SwRootNotSet)?
            .join(sessions_dir)
            .join(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));
        let records_root = session_root.join(RECORDS_DIR);
        fs::create_dir_all(&records_root)
            .map_err(|e| SessionInitError::CannotCreateDir(records_root.clone(), e))?;

        let (writer_tx, writer_rx) = channel();

        STATE
            .try_init_once(|| SessionState {
                epoch,
                writer: Mutex::new(writer_tx.clone()),
            })
            .map_err(|_| SessionInitError::AlreadyStarted)?;

        let writer = {
            let root = records_root.clone();
            thread::Builder::new()
                .name("record_writer".into())
                .spawn(move || record_writer(root, writer_rx))
                .map_err(SessionInitError::WriterSpawnError)?
        };

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            records_root,
            epoch,
            writer_tx,
            writer: Some(writer),
        })
    }

    pub fn epoch(&self) -> &DateTime<Utc> {
        &self.epoch
    }

    /// End the session. Records queued before this call are written before it returns.
    pub fn exit(mut self) {
        if self.writer_tx.send(WriterMsg::Stop).is_err() {
            warn!("Record writer already stopped");
        }

        if let Some(h) = self.writer.take() {
            if h.join().is_err() {
                warn!("Record writer panicked");
            }
        }

        info!("Session ended");
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session started, or `NaN` if there is no session.
pub fn get_elapsed_seconds() -> f64 {
    STATE
        .get()
        .and_then(|s| time::duration_to_seconds(Utc::now() - s.epoch))
        .unwrap_or(std::f64::NAN)
}

/// Queue `data` to be written as JSON to `path` within the records directory, with the current
/// time inserted before the extension (`hits/hit.json` becomes
/// `hits/hit_20210304_050607_250.json`).
///
/// Without a running session the record is dropped with a warning.
pub fn save_with_timestamp<P: AsRef<Path>, T: Serialize + Send + 'static>(path: P, data: T) {
    let path = timestamped_path(path.as_ref(), Utc::now());

    let state = match STATE.get() {
        Some(s) => s,
        None => {
            warn!("No session running, dropping record {:?}", path);
            return;
        }
    };

    let sent = match state.writer.lock() {
        Ok(tx) => tx.send(WriterMsg::Record(path.clone(), Box::new(data))).is_ok(),
        Err(_) => false,
    };

    if !sent {
        warn!("Record writer unavailable, dropping record {:?}", path);
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Insert the formatted timestamp between the stem and extension of the path.
fn timestamped_path(path: &Path, time: DateTime<Utc>) -> PathBuf {
    let mut name = path
        .file_stem()
        .unwrap_or_else(|| OsStr::new(""))
        .to_os_string();
    name.push(format!("_{}", time.format(RECORD_TIMESTAMP_FORMAT)));

    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }

    path.with_file_name(name)
}

fn record_writer(root: PathBuf, rx: Receiver<WriterMsg>) {
    loop {
        match rx.recv_timeout(WRITER_POLL_PERIOD) {
            Ok(WriterMsg::Record(path, data)) => write_record(&root.join(path), &data),
            Ok(WriterMsg::Stop) => {
                // Drain what was queued before the stop
                while let Ok(WriterMsg::Record(path, data)) = rx.try_recv() {
                    write_record(&root.join(path), &data);
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn write_record(path: &Path, data: &RecordData) {
    if path.extension().and_then(OsStr::to_str) != Some("json") {
        warn!("Records must be .json files, not writing {:?}", path);
        return;
    }

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("Could not create {:?}: {}", dir, e);
            return;
        }
    }

    let result = File::create(path)
        .map_err(|e| e.to_string())
        .and_then(|f| serde_json::to_writer_pretty(f, data).map_err(|e| e.to_string()));

    match result {
        Ok(()) => debug!("Wrote record {:?}", path),
        Err(e) => warn!("Could not write record {:?}: {}", path, e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamped_path() {
        let t = Utc.ymd(2021, 3, 4).and_hms_milli(5, 6, 7, 250);
        assert_eq!(
            timestamped_path(Path::new("hits/hit.json"), t),
            PathBuf::from("hits/hit_20210304_050607_250.json")
        );
        assert_eq!(
            timestamped_path(Path::new("court"), t),
            PathBuf::from("court_20210304_050607_250")
        );

        // Records within the same second get distinct names
        let later = Utc.ymd(2021, 3, 4).and_hms_milli(5, 6, 7, 900);
        assert_ne!(
            timestamped_path(Path::new("hits/hit.json"), t),
            timestamped_path(Path::new("hits/hit.json"), later)
        );
    }

    #[test]
    fn test_write_record() {
        let dir = std::env::temp_dir().join(format!("session_test_{}", std::process::id()));
        let path = dir.join("routes").join("route.json");
        let data: RecordData = Box::new(vec![1.0f64, 2.5]);

        write_record(&path, &data);
        let read: Vec<f64> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, vec![1.0, 2.5]);

        // Non-json paths are refused
        let txt = dir.join("route.txt");
        write_record(&txt, &data);
        assert!(!txt.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
