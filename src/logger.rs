//! Pin-state snapshot log.
//!
//! Records are appended as `<timestamp>, <level>, <level>, ...\r\n` with one
//! level per mapped pin in ascending logical-port order. The logging flag and
//! every file access share one mutex, so appends never interleave and a
//! reader never sees half a line.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::AppError;
use crate::gpio::{EdgeEvent, EdgeSink, GpioBackend, PinRegistry};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

struct LogState {
    enabled: bool,
}

pub struct EventLogger<B: GpioBackend> {
    registry: Arc<PinRegistry<B>>,
    path: PathBuf,
    state: Mutex<LogState>,
}

impl<B: GpioBackend> EventLogger<B> {
    /// Opens the log at `path`, creating an empty file if there is none.
    /// Logging starts disabled.
    pub fn open(
        registry: Arc<PinRegistry<B>>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, AppError> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            registry,
            path,
            state: Mutex::new(LogState { enabled: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Flips the logging flag and returns the new value.
    pub fn toggle(&self) -> bool {
        let mut state = self.state.lock();
        state.enabled = !state.enabled;
        state.enabled
    }

    pub fn disable(&self) {
        self.state.lock().enabled = false;
    }

    /// Appends a snapshot whether or not logging is enabled.
    pub fn log_now(&self) -> Result<(), AppError> {
        let state = self.state.lock();
        self.append(&state)
    }

    /// Appends a snapshot if logging is enabled. Failures are reported and
    /// the record is dropped.
    pub fn on_pin_event(&self, event: &EdgeEvent) {
        let state = self.state.lock();
        if !state.enabled {
            return;
        }

        debug!(
            "Logging {:?} edge on pin #{} (port {})",
            event.edge, event.pin, event.port
        );
        if let Err(e) = self.append(&state) {
            warn!("Dropped log record for pin #{} event: {e}", event.pin);
        }
    }

    /// Truncates the log to zero length.
    pub fn clear(&self) -> Result<(), AppError> {
        let _state = self.state.lock();
        File::create(&self.path)?;
        Ok(())
    }

    pub fn read(&self) -> Result<String, AppError> {
        let _state = self.state.lock();
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of the log in bytes, 0 if the file has gone missing.
    pub fn size(&self) -> Result<u64, AppError> {
        let _state = self.state.lock();
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    // Caller holds the state lock.
    fn append(&self, _state: &LogState) -> Result<(), AppError> {
        let levels = self
            .registry
            .read_state()
            .into_iter()
            .map(|reading| reading.level)
            .collect::<Result<Vec<_>, _>>()?;
        let record = format_record(&Local::now(), &levels);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.as_bytes())?;
        debug!("Appended record: {}", record.trim_end());
        Ok(())
    }
}

impl<B: GpioBackend> EdgeSink for EventLogger<B> {
    fn on_edge(&self, event: EdgeEvent) {
        self.on_pin_event(&event);
    }
}

pub fn format_record(timestamp: &DateTime<Local>, levels: &[bool]) -> String {
    let mut line = timestamp.format(TIMESTAMP_FORMAT).to_string();
    for level in levels {
        line.push_str(", ");
        line.push_str(if *level { "true" } else { "false" });
    }
    line.push_str("\r\n");
    line
}
