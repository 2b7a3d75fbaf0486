//! Frame capture for debugging links (`debug-tools` feature).
//!
//! Each frame becomes one line: `<unix micros> <TX|RX> <hex bytes>`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::util::to_hex;

/// Direction of a recorded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by this side
    Outbound,
    /// Received from the station
    Inbound,
}

/// Thread-safe wrapper around a capture file.
#[derive(Clone)]
pub struct FrameRecorder {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl FrameRecorder {
    /// Create a recorder that writes to the provided path, truncating any existing file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    /// Record a frame with the current system timestamp.
    pub fn record(&self, direction: Direction, frame: &[u8]) -> io::Result<()> {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros();
        let tag = match direction {
            Direction::Outbound => "TX",
            Direction::Inbound => "RX",
        };
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("frame recorder poisoned"))?;
        writeln!(guard, "{micros} {tag} {}", to_hex(frame))?;
        guard.flush()
    }
}

impl std::fmt::Debug for FrameRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRecorder").finish_non_exhaustive()
    }
}
