use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::config::{AppConfig, PinConfig};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Debug, Clone)]
pub struct EdgeEvent {
    pub port: u32,
    pub pin: u32,
    pub edge: Edge,
    pub timestamp_ms: u64,
}

/// Receiver of edge notifications. Called from the backend's listener
/// context, possibly concurrently with request handlers.
pub trait EdgeSink: Send + Sync {
    fn on_edge(&self, event: EdgeEvent);
}

pub type EventHandler = Arc<dyn EdgeSink>;

pub trait GpioBackend: Send + Sync {
    /// Configures `entry` as a pulled-down input reporting both edges to `handler`.
    fn configure_input(&self, entry: &PinConfig, handler: EventHandler) -> Result<(), AppError>;
    /// Current level of the header pin, `true` when high.
    fn read_level(&self, pin: u32) -> Result<bool, AppError>;
}

/// One row of [`PinRegistry::read_state`].
#[derive(Debug)]
pub struct PinReading {
    pub port: u32,
    pub pin: u32,
    pub level: Result<bool, AppError>,
}

pub struct PinRegistry<B: GpioBackend> {
    entries: Vec<PinConfig>,
    backend: Arc<B>,
    initialized: AtomicBool,
}

impl<B: GpioBackend> PinRegistry<B> {
    pub fn new(config: &AppConfig, backend: Arc<B>) -> Self {
        Self {
            entries: config.pin_configs(),
            backend,
            initialized: AtomicBool::new(false),
        }
    }

    /// Sets up every mapped pin and subscribes it to `handler`. Only the
    /// first call does anything; later calls fail without touching hardware.
    pub fn init(&self, handler: EventHandler) -> Result<(), AppError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::InvalidState(
                "pin registry is already initialized".into(),
            ));
        }

        for entry in &self.entries {
            debug!("Setting up pin #{} (port {})", entry.pin, entry.port);
            self.backend.configure_input(entry, handler.clone())?;
        }
        Ok(())
    }

    pub fn mapping(&self) -> &[PinConfig] {
        &self.entries
    }

    /// Reads every mapped pin, ascending by logical port.
    pub fn read_state(&self) -> Vec<PinReading> {
        self.entries
            .iter()
            .map(|entry| PinReading {
                port: entry.port,
                pin: entry.pin,
                level: self.backend.read_level(entry.pin),
            })
            .collect()
    }
}
