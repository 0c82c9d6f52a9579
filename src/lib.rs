mod auth;
mod backend;
mod config;
mod error;
mod gpio;
mod html;
mod logger;
mod routes;

pub use auth::{AuthProvider, StaticCredentials};
pub use config::{AppConfig, HttpConfig, PinConfig};
pub use error::AppError;
pub use gpio::{Edge, EdgeEvent, EdgeSink, EventHandler, GpioBackend, PinReading, PinRegistry};
pub use logger::{EventLogger, TIMESTAMP_FORMAT, format_record};
pub use routes::AppState;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::MockGpioBackend;
