#![warn(clippy::match_same_arms)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::unnecessary_wraps)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod util;
mod adapter;
mod camera;
mod config;
mod consts;
mod device;
mod errors;
mod sensor;

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use tokio::time::{sleep, timeout};

pub use crate::adapter::BrightnessAdapter;
pub use crate::camera::{CameraLightSensor, PixelLayout, frame_light_level};
pub use crate::config::AmbrightConfig;
use crate::consts::*;
pub use crate::device::{Backlight, BrightnessLevel};
pub use crate::errors::AmbrightError;
use crate::errors::*;
pub use crate::sensor::{AmbientLightSensor, LightLevel, LightSensor, lux_to_light_level};
pub use tokio_util::sync::CancellationToken;

make_log_macro!(debug, "service");
make_log_macro!(info, "service");
make_log_macro!(warn, "service");
make_log_macro!(error, "service");

/// Used to construct [`Ambright`]
pub struct AmbrightBuilder<'a> {
    device_regex: &'a str,
    config: Option<AmbrightConfig>,
    backlight_path: PathBuf,
    sensor_path: PathBuf,
}

impl Default for AmbrightBuilder<'_> {
    fn default() -> Self {
        Self {
            device_regex: ".",
            config: None,
            backlight_path: PathBuf::from(DEVICES_PATH),
            sensor_path: PathBuf::from(IIO_DEVICES_PATH),
        }
    }
}

impl<'a> AmbrightBuilder<'a> {
    /// Create a new [`AmbrightBuilder`].
    pub fn new() -> Self {
        AmbrightBuilder::default()
    }

    /// Defaults to `"."` (matches all backlight devices).
    pub fn with_device_regex(mut self, device_regex: &'a str) -> Self {
        self.device_regex = device_regex;
        self
    }

    /// Defaults to [`AmbrightConfig::new()`].
    pub fn with_config(mut self, config: AmbrightConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to `/sys/class/backlight`.
    pub fn with_backlight_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backlight_path = path.into();
        self
    }

    /// Defaults to `/sys/bus/iio/devices`.
    pub fn with_sensor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sensor_path = path.into();
        self
    }

    /// Discover the sensor and backlight. Missing hardware is fatal, the
    /// returned error is one of the discovery errors.
    pub async fn build(self) -> Result<Ambright> {
        let config = match self.config {
            Some(config) => config,
            None => AmbrightConfig::new().await?,
        };

        Ambright::new(
            Regex::new(self.device_regex)?,
            config,
            &self.backlight_path,
            &self.sensor_path,
        )
        .await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// The control loop: poll the sensor, work out a brightness, apply it.
pub struct Ambright {
    sensor: LightSensor,
    backlight: Backlight,
    adapter: BrightnessAdapter,
    update_interval: Duration,
    state: ServiceState,
    /// The only thing carried from one update to the next
    last_applied: Option<BrightnessLevel>,
}

impl Ambright {
    pub(crate) async fn new(
        device_regex: Regex,
        config: AmbrightConfig,
        backlight_path: &Path,
        sensor_path: &Path,
    ) -> Result<Self> {
        let config = config.validated();
        let mut sensor = select_sensor(sensor_path, config.enable_camera).await?;

        let backlight =
            match Backlight::discover(backlight_path, &device_regex, config.use_logind).await {
                Ok(backlight) => backlight,
                Err(e) => {
                    error!("brightness control not available");
                    sensor.release();
                    return Err(e);
                }
            };
        info!(
            "using backlight {} (max: {})",
            backlight.device_name,
            backlight.max_brightness()
        );

        Ok(Self {
            sensor,
            backlight,
            adapter: BrightnessAdapter::new(&config),
            update_interval: config.update_interval,
            state: ServiceState::Starting,
            last_applied: None,
        })
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Brightness written by the last successful update.
    pub fn last_applied(&self) -> Option<BrightnessLevel> {
        self.last_applied
    }

    /// Run until `shutdown` is cancelled, then release the sensor.
    /// A stopped service can't be run again.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        if self.state != ServiceState::Starting {
            return Err(AmbrightError::Other(format!(
                "service can't run from {:?}",
                self.state
            )));
        }
        self.enter_running().await;

        while !shutdown.is_cancelled() {
            self.step().await;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(self.update_interval) => {}
            }
        }

        self.stop();
        Ok(())
    }

    async fn enter_running(&mut self) {
        self.last_applied = self.backlight.get_current().await;
        self.state = ServiceState::Running;
        info!(
            "ambient brightness service started, brightness {:?}",
            self.last_applied
        );
    }

    /// One update. Returns the brightness written, if anything was written.
    pub async fn step(&mut self) -> Option<BrightnessLevel> {
        let reading = timeout(self.update_interval, self.sensor.read_light_level()).await;
        let light = match reading {
            Ok(Ok(Some(light))) => light,
            Ok(Ok(None)) => {
                debug!("no light reading, skipping");
                return None;
            }
            Ok(Err(e)) => {
                warn!("error reading {}: {e}", self.sensor);
                return None;
            }
            Err(_) => {
                warn!("reading {} timed out", self.sensor);
                return None;
            }
        };

        let target = self.adapter.map_light_to_brightness(light);
        let smoothed = self.adapter.smooth_transition(self.last_applied, target);
        if self.last_applied == Some(smoothed) {
            return None;
        }

        match self.backlight.set(smoothed).await {
            Ok(()) => {
                debug!("light {light:.1}% -> brightness {smoothed}% (target {target}%)");
                self.last_applied = Some(smoothed);
                Some(smoothed)
            }
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }

    fn stop(&mut self) {
        self.state = ServiceState::Stopping;
        self.sensor.release();
        self.state = ServiceState::Stopped;
        info!("service stopped");
    }
}

/// Prefer the ambient light sensor, fall back to the camera if allowed.
async fn select_sensor(sensor_path: &Path, enable_camera: bool) -> Result<LightSensor> {
    if let Some(sensor) = AmbientLightSensor::discover(sensor_path).await {
        let sensor = LightSensor::Ambient(sensor);
        info!("using {sensor}");
        return Ok(sensor);
    }

    if enable_camera {
        if let Some(camera) = CameraLightSensor::discover() {
            info!("using camera as fallback sensor");
            return Ok(LightSensor::Camera(camera));
        }
    } else {
        debug!("camera fallback disabled");
    }

    error!("no sensors available");
    Err(AmbrightError::NoSensor)
}
