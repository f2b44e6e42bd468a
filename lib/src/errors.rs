use std::path::PathBuf;

use thiserror::Error;

/// Result type returned from functions that can have our `Error`s.
pub type Result<T, E = AmbrightError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AmbrightError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("{0}")]
    DBus(#[from] zbus::Error),

    #[error("{0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("No ambient light sensor or camera available")]
    NoSensor,

    #[error("No backlight devices found in {}", .path.display())]
    NoBacklight { path: PathBuf },

    #[error(
        "Permission denied writing {}. Run as root, add a udev rule granting write access to the backlight, or enable use_logind",
        .path.display()
    )]
    PermissionDenied { path: PathBuf },

    #[error("Could not write brightness to {}: {source}", .path.display())]
    Device {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl AmbrightError {
    /// Whether this error means the hardware needed to start is missing.
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::NoSensor | Self::NoBacklight { .. })
    }
}

/// Attach a message to foreign errors.
pub trait ResultExt<T> {
    fn error(self, message: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn error(self, message: &str) -> Result<T> {
        self.map_err(|e| AmbrightError::Other(format!("{message}: {e}")))
    }
}
