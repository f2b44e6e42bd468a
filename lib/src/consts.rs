use std::ops::RangeInclusive;

/// Location of backlight devices
pub const DEVICES_PATH: &str = "/sys/class/backlight";

/// Location of industrial I/O devices, where ambient light sensors live
pub const IIO_DEVICES_PATH: &str = "/sys/bus/iio/devices";

/// Prefix of every IIO device directory
pub const IIO_DEVICE_PREFIX: &str = "iio:device";

/// Filename for device's max brightness
pub const FILE_MAX_BRIGHTNESS: &str = "max_brightness";

/// Filename for current brightness.
pub const FILE_BRIGHTNESS: &str = "actual_brightness";

/// amdgpu drivers set the actual_brightness in a different scale than
/// [0, max_brightness], so we have to use the 'brightness' file instead.
pub const FILE_BRIGHTNESS_AMD: &str = "brightness";

/// set the requested brightness level
pub const FILE_BRIGHTNESS_WRITE: &str = "brightness";

/// Used when a device does not report a usable max_brightness
pub const DEFAULT_MAX_BRIGHTNESS: u32 = 100;

/// Filename for an IIO device's name
pub const FILE_IIO_NAME: &str = "name";

/// Light channels, in order of preference
pub const FILES_ILLUMINANCE: [&str; 3] = [
    "in_illuminance_input",
    "in_illuminance_raw",
    "in_intensity_both_raw",
];

/// Multiplier turning a raw illuminance reading into lux
pub const FILE_ILLUMINANCE_SCALE: &str = "in_illuminance_scale";

/// Illuminance mapped to the top of the light scale, roughly direct daylight
pub const LUX_CEILING: f64 = 50_000.0;

/// V4L2 index of the camera used as a fallback sensor
pub const CAMERA_INDEX: usize = 0;

/// Brightness written to a device is never allowed outside this range,
/// whatever the configuration says. 0 would turn the panel off.
pub const DEVICE_BRIGHTNESS_RANGE: RangeInclusive<u8> = 1..=100;

/// Range of valid values for `min_brightness` and `max_brightness`
pub const BRIGHTNESS_RANGE: RangeInclusive<u8> = 1..=100;

/// Light level where dim surroundings end
pub const DIM_LIGHT_END: f64 = 20.0;

/// Light level where bright surroundings begin
pub const BRIGHT_LIGHT_START: f64 = 60.0;

/// Brightness at the end of the dim band
pub const DIM_BRIGHTNESS_END: f64 = 40.0;

/// Brightness at the start of the bright band
pub const BRIGHT_BRIGHTNESS_START: f64 = 75.0;

/// Brightness gained across the bright band
pub const BRIGHT_BRIGHTNESS_SPAN: f64 = 25.0;

/// Name of our directory inside the config dirs
pub const CONFIG_DIR_NAME: &str = "ambright";

/// System wide config directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/ambright";
