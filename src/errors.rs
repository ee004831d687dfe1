//! Crate-wide error type.

use snafu::Snafu;

pub use crate::errors::Error::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Servo map is malformed or internally inconsistent: {info}.
    ConfigError { info: String },
    /// Unknown servo joint: {name}.
    UnknownServo { name: String },
    /// PWM bus error on board 0x{address:02x}: {info}.
    BusError { address: u8, info: String },
    /// Unsupported goal action: {action}.
    UnsupportedAction { action: String },
    /// {info}
    Other { info: String },
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Other {
            info: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Other {
            info: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UnknownServo {
            name: "fl_hip".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown servo joint: fl_hip.");

        let err = BusError {
            address: 0x40,
            info: "timeout".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "PWM bus error on board 0x40: timeout."
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Other { .. }));
    }
}
