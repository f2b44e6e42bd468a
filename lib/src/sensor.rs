use crate::camera::CameraLightSensor;
use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

make_log_macro!(debug, "sensor");
make_log_macro!(info, "sensor");
make_log_macro!(warn, "sensor");

/// Ambient light on a 0.0..=100.0 scale.
pub type LightLevel = f64;

/// Something we can poll for the ambient light level.
///
/// Neither variant knows about the other; picking one is the service's job.
pub enum LightSensor {
    Ambient(AmbientLightSensor),
    Camera(CameraLightSensor),
}

impl LightSensor {
    /// `Ok(None)` means there is no reading this time and the caller should
    /// just try again later.
    pub async fn read_light_level(&mut self) -> Result<Option<LightLevel>> {
        match self {
            Self::Ambient(sensor) => sensor.read_light_level().await,
            Self::Camera(sensor) => Ok(sensor.read_light_level().await),
        }
    }

    /// Give back any device handles held by the sensor.
    pub fn release(&mut self) {
        if let Self::Camera(sensor) = self {
            sensor.release();
        }
    }
}

impl fmt::Display for LightSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ambient(sensor) => write!(f, "ambient light sensor {}", sensor.name),
            Self::Camera(_) => write!(f, "camera"),
        }
    }
}

/// An illuminance sensor exposed through the IIO subsystem.
#[derive(Debug)]
pub struct AmbientLightSensor {
    pub name: String,
    device_path: PathBuf,
    scale: f64,
}

impl AmbientLightSensor {
    /// Use the first IIO device under `iio_path` that has a light channel.
    pub async fn discover(iio_path: impl AsRef<Path>) -> Option<Self> {
        let iio_path = iio_path.as_ref();
        let entries = match sorted_entries(iio_path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("IIO subsystem not available at {}: {e}", iio_path.display());
                return None;
            }
        };

        for (dir_name, device_path) in entries {
            if !dir_name.starts_with(IIO_DEVICE_PREFIX) {
                continue;
            }
            let name = read_file(device_path.join(FILE_IIO_NAME))
                .await
                .unwrap_or_else(|_| dir_name.clone());
            debug!("found IIO device {name} at {}", device_path.display());

            if !has_light_channel(&device_path).await {
                continue;
            }

            let scale = match read_number::<f64>(device_path.join(FILE_ILLUMINANCE_SCALE)).await
            {
                Ok(scale) if scale.is_finite() => scale,
                _ => 1.0,
            };
            info!("using {name} at {} (scale {scale})", device_path.display());
            return Some(Self {
                name,
                device_path,
                scale,
            });
        }

        warn!("no ambient light sensor detected");
        None
    }

    pub async fn read_light_level(&self) -> Result<Option<LightLevel>> {
        for file in FILES_ILLUMINANCE {
            let raw = match read_file(self.device_path.join(file)).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let lux = raw.trim().parse::<f64>()? * self.scale;
            return Ok(Some(lux_to_light_level(lux)));
        }

        debug!("{} has no light channel any more", self.name);
        Ok(None)
    }
}

async fn has_light_channel(device_path: &Path) -> bool {
    for file in FILES_ILLUMINANCE {
        if tokio::fs::try_exists(device_path.join(file))
            .await
            .unwrap_or(false)
        {
            return true;
        }
    }
    false
}

/// Compress lux logarithmically onto 0..=100, which is closer to how bright
/// things look than the raw value.
pub fn lux_to_light_level(lux: f64) -> LightLevel {
    if lux.is_nan() || lux <= 0.0 {
        return 0.0;
    }
    ((lux + 1.0).log10() / LUX_CEILING.log10() * 100.0).clamp(0.0, 100.0)
}
