use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::PinConfig;
use crate::error::AppError;
use crate::gpio::{Edge, EdgeEvent, EventHandler, GpioBackend};

/// In-memory backend. Pins start low once configured; [`MockGpioBackend::set_level`]
/// plays the part of the outside world driving an input.
#[derive(Default)]
pub struct MockGpioBackend {
    pins: RwLock<HashMap<u32, Mutex<MockPinState>>>, // keyed by header pin
}

struct MockPinState {
    port: u32,
    level: bool,
    fail_reads: bool,
    handler: Option<EventHandler>,
}

impl MockGpioBackend {
    /// Drives `pin` to `level`, reporting an edge to the subscribed handler if
    /// the level changed. The handler runs on the caller's thread after all
    /// backend locks are released, so it may read pins itself.
    pub fn set_level(&self, pin: u32, level: bool) -> Result<(), AppError> {
        let dispatch = {
            let pins = self
                .pins
                .read()
                .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
            let entry = pins
                .get(&pin)
                .ok_or_else(|| AppError::InvalidState(format!("pin {pin} is not configured")))?;
            let mut state = entry
                .lock()
                .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;

            let old = state.level;
            state.level = level;

            let edge = match (old, level) {
                (false, true) => Some(Edge::Rising),
                (true, false) => Some(Edge::Falling),
                _ => None,
            };
            edge.zip(state.handler.clone()).map(|(edge, handler)| {
                (
                    handler,
                    EdgeEvent {
                        port: state.port,
                        pin,
                        edge,
                        timestamp_ms: epoch_millis(),
                    },
                )
            })
        };

        if let Some((handler, event)) = dispatch {
            handler.on_edge(event);
        }
        Ok(())
    }

    /// Makes subsequent reads of `pin` fail until called again with `false`.
    pub fn fail_reads(&self, pin: u32, fail: bool) -> Result<(), AppError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins
            .get(&pin)
            .ok_or_else(|| AppError::InvalidState(format!("pin {pin} is not configured")))?;
        entry
            .lock()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?
            .fail_reads = fail;
        Ok(())
    }
}

impl GpioBackend for MockGpioBackend {
    fn configure_input(&self, entry: &PinConfig, handler: EventHandler) -> Result<(), AppError> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;

        // pull-down: an undriven input reads low
        pins.insert(
            entry.pin,
            Mutex::new(MockPinState {
                port: entry.port,
                level: false,
                fail_reads: false,
                handler: Some(handler),
            }),
        );
        Ok(())
    }

    fn read_level(&self, pin: u32) -> Result<bool, AppError> {
        let pins = self
            .pins
            .read()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        let entry = pins.get(&pin).ok_or_else(|| AppError::PinRead {
            pin,
            reason: "pin not configured".into(),
        })?;
        let state = entry
            .lock()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;

        if state.fail_reads {
            return Err(AppError::PinRead {
                pin,
                reason: "simulated read failure".into(),
            });
        }
        Ok(state.level)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
