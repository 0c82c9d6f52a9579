use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// (header position, BCM line) for every 40-pin connector position that
/// carries a GPIO. Everything else is power or ground.
const HEADER_TO_BCM: [(u32, u32); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// BCM line wired to a header position, `None` for power and ground.
pub fn bcm_line(header_pin: u32) -> Option<u32> {
    HEADER_TO_BCM
        .iter()
        .find(|(header, _)| *header == header_pin)
        .map(|(_, line)| *line)
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            unix_socket: None,
            host: Some("0.0.0.0:8080".to_string()),
            path: String::new(),
        }
    }
}

/// One entry of the pin map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    /// Broadcom GPIO number.
    pub port: u32,
    /// Position on the 40-pin header.
    pub pin: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub chip: String,
    /// Logical port -> physical header pin.
    pub pins: BTreeMap<u32, u32>,
    pub users: BTreeMap<String, String>,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            chip: "/dev/gpiochip0".to_string(),
            pins: default_pin_map(),
            users: BTreeMap::from([("admin".to_string(), "root".to_string())]),
            log_file: PathBuf::from("minilog.log"),
        }
    }
}

/// Raspberry Pi 3 Model B.
fn default_pin_map() -> BTreeMap<u32, u32> {
    BTreeMap::from([
        (2, 3),
        (3, 5),
        (4, 7),
        (5, 29),
        (6, 31),
        (7, 26),
        (8, 24),
        (9, 21),
        (10, 19),
        (11, 23),
        (12, 32),
        (13, 33),
        (14, 8),
        (15, 10),
        (16, 36),
        (17, 11),
        (18, 12),
        (19, 35),
        (20, 38),
        (21, 40),
        (22, 15),
        (23, 16),
        (24, 18),
        (25, 22),
        (26, 37),
        (27, 13),
    ])
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it was named explicitly, otherwise falls back to the
    /// built-in defaults if the default file does not exist.
    pub fn load(path: Option<String>) -> Result<Self, AppError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None if Path::new("config.json").exists() => Self::load_from_file("config.json"),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.pins.is_empty() {
            return Err(AppError::Config("pin map is empty".into()));
        }
        if self.http.host.is_none() && self.http.unix_socket.is_none() {
            return Err(AppError::Config(
                "either 'host' or 'unix_socket' must be specified".into(),
            ));
        }

        // ports are BCM numbers, so each header pin has exactly one valid port
        for (port, pin) in &self.pins {
            match bcm_line(*pin) {
                None => {
                    return Err(AppError::Config(format!(
                        "port {port}: header pin {pin} is not an input-capable GPIO"
                    )));
                }
                Some(line) if line != *port => {
                    return Err(AppError::Config(format!(
                        "port {port}: header pin {pin} is wired to GPIO {line}"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Pin map entries in ascending logical-port order.
    pub fn pin_configs(&self) -> Vec<PinConfig> {
        self.pins
            .iter()
            .map(|(&port, &pin)| PinConfig { port, pin })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.pins.len(), 26);
        assert_eq!(cfg.pins[&2], 3);
        assert_eq!(cfg.users["admin"], "root");
        assert_eq!(cfg.http.host.as_deref(), Some("0.0.0.0:8080"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = AppConfig::from_json(r#"{ "pins": { "3": 5, "2": 3 } }"#).unwrap();
        assert_eq!(
            cfg.pin_configs(),
            vec![PinConfig { port: 2, pin: 3 }, PinConfig { port: 3, pin: 5 }]
        );
        assert_eq!(cfg.log_file, PathBuf::from("minilog.log"));
        assert_eq!(cfg.chip, "/dev/gpiochip0");
    }

    #[test]
    fn rejects_duplicate_header_pin() {
        let err = AppConfig::from_json(r#"{ "pins": { "2": 3, "4": 3 } }"#).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn rejects_port_not_wired_to_its_pin() {
        let err = AppConfig::from_json(r#"{ "pins": { "2": 40 } }"#).unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("wired to GPIO 21")));

        let cfg = AppConfig::from_json(r#"{ "pins": { "21": 40 } }"#).unwrap();
        assert_eq!(cfg.pin_configs(), vec![PinConfig { port: 21, pin: 40 }]);
    }

    #[test]
    fn default_map_matches_header_wiring() {
        for (port, pin) in &AppConfig::default().pins {
            assert_eq!(bcm_line(*pin), Some(*port), "header pin {pin}");
        }
        assert_eq!(bcm_line(40), Some(21));
        assert_eq!(bcm_line(1), None);
    }

    #[test]
    fn rejects_power_and_ground_pins() {
        for pin in [1, 2, 6, 17, 39, 41] {
            let json = format!(r#"{{ "pins": {{ "2": {pin} }} }}"#);
            assert!(AppConfig::from_json(&json).is_err(), "pin {pin} accepted");
        }
    }

    #[test]
    fn rejects_empty_map_and_missing_listener() {
        assert!(AppConfig::from_json(r#"{ "pins": {} }"#).is_err());
        assert!(AppConfig::from_json(r#"{ "http": { "host": null } }"#).is_err());
    }
}
