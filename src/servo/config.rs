//! Servo calibration: one [`ServoConfig`] per joint, loaded from the servo-map JSON file.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Error};

fn default_min_pulse_us() -> u16 {
    500
}

fn default_max_pulse_us() -> u16 {
    2500
}

/// Calibration data for a single joint, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServoConfig {
    /// Unique string identifier for this joint.
    pub name: String,
    /// I2C address of the PWM board carrying this joint, e.g. `"0x40"`.
    #[serde(deserialize_with = "deserialize_hex_u8", serialize_with = "serialize_hex_u8")]
    pub board_addr: u8,
    /// Channel (0-15) on that board.
    pub channel: u8,
    /// Mechanical lower limit, degrees.
    pub angle_min: f64,
    /// Mechanical upper limit, degrees.
    pub angle_max: f64,
    /// Resting angle; defaults to the midpoint of `[angle_min, angle_max]`.
    pub neutral: Option<f64>,
    /// Degrees added to a requested angle before clamping (mechanical trim).
    #[serde(default)]
    pub offset: f64,
    /// If true, the joint is mirrored about 90°: `output = 180 - input`.
    #[serde(default)]
    pub reversed: bool,
    /// Pulse width (microseconds) corresponding to angle 0 over the full range.
    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: u16,
    /// Pulse width (microseconds) corresponding to angle 180 over the full range.
    #[serde(default = "default_max_pulse_us")]
    pub max_pulse_us: u16,
}

impl ServoConfig {
    /// Resolved neutral angle: the configured value, or the midpoint of the range.
    pub fn resolved_neutral(&self) -> f64 {
        self.neutral
            .unwrap_or((self.angle_min + self.angle_max) / 2.0)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(ConfigError {
                info: "servo map: missing name field".to_string(),
            });
        }
        if self.board_addr > 127 {
            return Err(ConfigError {
                info: format!(
                    "servo {}: board_addr {} out of range 0-127",
                    self.name, self.board_addr
                ),
            });
        }
        if self.channel > 15 {
            return Err(ConfigError {
                info: format!("servo {}: channel {} out of range 0-15", self.name, self.channel),
            });
        }
        if self.angle_min >= self.angle_max {
            return Err(ConfigError {
                info: format!(
                    "servo {}: angle_min ({}) must be < angle_max ({})",
                    self.name, self.angle_min, self.angle_max
                ),
            });
        }
        if self.angle_min < 0.0 || self.angle_max > 180.0 {
            return Err(ConfigError {
                info: format!("servo {}: angle range must fall within [0, 180]", self.name),
            });
        }
        let neutral = self.resolved_neutral();
        if neutral < self.angle_min || neutral > self.angle_max {
            return Err(ConfigError {
                info: format!(
                    "servo {}: neutral ({}) outside mechanical range [{}, {}]",
                    self.name, neutral, self.angle_min, self.angle_max
                ),
            });
        }
        Ok(())
    }
}

fn deserialize_hex_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let raw = String::deserialize(deserializer)?;
    parse_hex_address(&raw).map_err(D::Error::custom)
}

fn serialize_hex_u8<S>(value: &u8, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format!("0x{:02X}", value))
}

/// Parses a `"0xNN"` board address, case-insensitively. Decimal strings are
/// rejected to avoid ambiguity between hex and decimal notations.
fn parse_hex_address(raw: &str) -> Result<u8, String> {
    let trimmed = raw.trim();
    let hex_digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| format!("board_addr '{raw}' must be a hex string like \"0x40\""))?;
    u8::from_str_radix(hex_digits, 16).map_err(|e| format!("board_addr '{raw}': {e}"))
}

/// Top-level servo-map JSON document: `{ "servos": [ ServoConfig, ... ] }`.
#[derive(Debug, Deserialize, Serialize)]
struct ServoMapFile {
    servos: Vec<ServoConfig>,
}

/// Loads and validates a servo-map JSON file, enforcing the global invariants:
/// unique names, unique `(board_addr, channel)` pairs, and well-formed per-joint
/// calibration. Any violation is a fatal [`Error::ConfigError`].
pub fn load_servo_map(path: impl AsRef<Path>) -> Result<Vec<ServoConfig>, Error> {
    let raw = fs::read_to_string(path)?;
    parse_servo_map(&raw)
}

/// Parses a servo-map JSON document already read into memory.
pub fn parse_servo_map(raw: &str) -> Result<Vec<ServoConfig>, Error> {
    let doc: ServoMapFile = serde_json::from_str(raw)?;

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();
    for servo in &doc.servos {
        servo.validate()?;
        if !names.insert(servo.name.clone()) {
            return Err(ConfigError {
                info: format!("duplicate servo name: {}", servo.name),
            });
        }
        if !addresses.insert((servo.board_addr, servo.channel)) {
            return Err(ConfigError {
                info: format!(
                    "duplicate channel {} on board 0x{:02x}",
                    servo.channel, servo.board_addr
                ),
            });
        }
    }

    Ok(doc.servos)
}
