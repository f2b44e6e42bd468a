//! Turns a light level into the brightness the screen should have.
//!
//! The curve has three bands. Dim surroundings still get a readable screen,
//! so the bottom band rises quickly from `min_brightness` to 40. The middle
//! band climbs to 75 and bright surroundings take up the last 25 points.

use crate::config::AmbrightConfig;
use crate::consts::*;
use crate::device::BrightnessLevel;
use crate::sensor::LightLevel;

make_log_macro!(trace, "adapter");

#[derive(Clone, Debug)]
pub struct BrightnessAdapter {
    smoothing_factor: f64,
    min_brightness: BrightnessLevel,
    max_brightness: BrightnessLevel,
}

impl BrightnessAdapter {
    pub fn new(config: &AmbrightConfig) -> Self {
        let config = config.validated();
        Self {
            smoothing_factor: config.smoothing_factor,
            min_brightness: config.min_brightness,
            max_brightness: config.max_brightness,
        }
    }

    /// Target brightness for `light`, within the configured bounds.
    pub fn map_light_to_brightness(&self, light: LightLevel) -> BrightnessLevel {
        let light = if light.is_nan() {
            0.0
        } else {
            light.clamp(0.0, 100.0)
        };
        let min = self.min_brightness as f64;

        let brightness = if light < DIM_LIGHT_END {
            min + (light / DIM_LIGHT_END) * (DIM_BRIGHTNESS_END - min)
        } else if light < BRIGHT_LIGHT_START {
            DIM_BRIGHTNESS_END
                + (light - DIM_LIGHT_END) / (BRIGHT_LIGHT_START - DIM_LIGHT_END)
                    * (BRIGHT_BRIGHTNESS_START - DIM_BRIGHTNESS_END)
        } else {
            BRIGHT_BRIGHTNESS_START
                + (light - BRIGHT_LIGHT_START) / (100.0 - BRIGHT_LIGHT_START)
                    * BRIGHT_BRIGHTNESS_SPAN
        };
        trace!("light {light:.1} -> {brightness:.2}");

        brightness.clamp(min, self.max_brightness as f64) as BrightnessLevel
    }

    /// Move part of the way from `current` to `target`. With nothing applied
    /// yet the target is used as is.
    pub fn smooth_transition(
        &self,
        current: Option<BrightnessLevel>,
        target: BrightnessLevel,
    ) -> BrightnessLevel {
        let Some(current) = current else {
            return target;
        };
        let current = current as f64;
        (current + self.smoothing_factor * (target as f64 - current)) as BrightnessLevel
    }
}
