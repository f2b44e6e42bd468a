use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use zbus::Connection;

make_log_macro!(debug, "device");
make_log_macro!(warn, "device");

/// Brightness as a percentage of the device's maximum.
pub type BrightnessLevel = u8;

#[zbus::dbus_proxy(
    interface = "org.freedesktop.login1.Session",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1/session/auto"
)]
trait Session {
    fn set_brightness(&self, subsystem: &str, name: &str, brightness: u32) -> zbus::Result<()>;
}

/// Represents a physical backlight device whose brightness level can be queried and set.
pub struct Backlight {
    pub device_name: String,
    read_brightness_file: PathBuf,
    write_brightness_file: PathBuf,
    max_brightness: u32,
    dbus_proxy: Option<SessionProxy<'static>>,
}

impl Backlight {
    pub async fn new(device_path: &Path, use_logind: bool) -> Result<Self> {
        let device_name = device_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                AmbrightError::Other(format!("{} is not a device", device_path.display()))
            })?;

        let actual_brightness = device_path.join(FILE_BRIGHTNESS);
        let read_brightness_file = if !device_name.starts_with("amdgpu_bl")
            && tokio::fs::try_exists(&actual_brightness)
                .await
                .unwrap_or(false)
        {
            actual_brightness
        } else {
            device_path.join(FILE_BRIGHTNESS_AMD)
        };

        let max_brightness = match read_number::<u32>(device_path.join(FILE_MAX_BRIGHTNESS)).await
        {
            Ok(max) if max > 0 => max,
            Ok(_) => DEFAULT_MAX_BRIGHTNESS,
            Err(e) => {
                debug!("{device_name}: no usable max_brightness ({e})");
                DEFAULT_MAX_BRIGHTNESS
            }
        };

        let dbus_proxy = if use_logind {
            match session_proxy().await {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    debug!("logind unavailable, writing sysfs directly: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            device_name,
            read_brightness_file,
            write_brightness_file: device_path.join(FILE_BRIGHTNESS_WRITE),
            max_brightness,
            dbus_proxy,
        })
    }

    /// Use the first device under `devices_path` whose name matches `device_regex`.
    pub async fn discover(
        devices_path: impl AsRef<Path>,
        device_regex: &regex::Regex,
        use_logind: bool,
    ) -> Result<Self> {
        let devices_path = devices_path.as_ref();
        let no_backlight = || AmbrightError::NoBacklight {
            path: devices_path.to_path_buf(),
        };

        let entries = sorted_entries(devices_path).await.map_err(|e| {
            warn!("backlight subsystem not available: {e}");
            no_backlight()
        })?;

        let (_, device_path) = entries
            .into_iter()
            .find(|(name, _)| {
                let matched = device_regex.is_match(name);
                debug!("{name:?} matched {}: {matched}", device_regex.as_str());
                matched
            })
            .ok_or_else(no_backlight)?;

        let backlight = Self::new(&device_path, use_logind).await?;
        debug!(
            "{} (max: {})",
            backlight.device_name, backlight.max_brightness
        );
        Ok(backlight)
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    /// Query the brightness of this backlight device as a percentage.
    /// `None` if the device can't be read.
    pub async fn get_current(&self) -> Option<BrightnessLevel> {
        match read_number::<u32>(&self.read_brightness_file).await {
            Ok(raw) => Some(raw_to_level(raw, self.max_brightness)),
            Err(e) => {
                warn!(
                    "error reading {}: {e}",
                    self.read_brightness_file.display()
                );
                None
            }
        }
    }

    /// Set the brightness of this backlight device as a percentage.
    ///
    /// The level is clamped to 1..=100 regardless of configuration, 0 is
    /// never written.
    pub async fn set(&self, level: BrightnessLevel) -> Result<()> {
        let raw = level_to_raw(level, self.max_brightness);

        if let Some(proxy) = &self.dbus_proxy {
            match proxy
                .set_brightness("backlight", &self.device_name, raw)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // Fall back to writing to sysfs brightness file
                    debug!("{e}");
                }
            }
        }

        self.write_sysfs(raw)
            .await
            .map_err(|e| write_error(&self.write_brightness_file, e))
    }

    async fn write_sysfs(&self, raw: u32) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.write_brightness_file)
            .await?;
        file.write_all(raw.to_string().as_bytes()).await?;
        file.flush().await
    }
}

async fn session_proxy() -> Result<SessionProxy<'static>> {
    let dbus_conn = Connection::system()
        .await
        .error("Failed to open DBus system connection")?;
    SessionProxy::new(&dbus_conn)
        .await
        .error("Failed to create SessionProxy")
}

fn raw_to_level(raw: u32, max_brightness: u32) -> BrightnessLevel {
    (raw as f64 / max_brightness as f64 * 100.0)
        .round()
        .clamp(0.0, 100.0) as BrightnessLevel
}

fn level_to_raw(level: BrightnessLevel, max_brightness: u32) -> u32 {
    let level = level.clamp(*DEVICE_BRIGHTNESS_RANGE.start(), *DEVICE_BRIGHTNESS_RANGE.end());
    let raw = (level as f64 / 100.0 * max_brightness as f64).round() as u32;
    raw.max(1)
}

/// Permission problems get their own error so the user can be told how to fix them.
fn write_error(path: &Path, source: std::io::Error) -> AmbrightError {
    if source.kind() == ErrorKind::PermissionDenied {
        AmbrightError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        AmbrightError::Device {
            path: path.to_path_buf(),
            source,
        }
    }
}
