use crate::consts::*;
use crate::errors::*;
use crate::util::*;

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use smart_default::SmartDefault;

make_log_macro!(debug, "config");
make_log_macro!(warn, "config");

#[derive(Clone, Debug, PartialEq, SmartDefault)]
pub struct AmbrightConfig {
    /// Fall back to the camera when there is no ambient light sensor
    #[default(true)]
    pub enable_camera: bool,

    /// Weight of the new target on each update, in (0, 1]
    #[default(0.3)]
    pub smoothing_factor: f64,

    #[default(Duration::from_secs(2))]
    pub update_interval: Duration,

    #[default(10)]
    pub min_brightness: u8,

    #[default(100)]
    pub max_brightness: u8,

    /// Ask systemd-logind to write the brightness before touching sysfs
    #[default(true)]
    pub use_logind: bool,
}

impl AmbrightConfig {
    /// Load `config.conf` from the user or system config dir, or use the defaults.
    pub async fn new() -> Result<Self> {
        if let Some(config_path) = find_file("config", Some("conf")) {
            Self::load(config_path).await
        } else {
            debug!("no config file, using defaults");
            Ok(AmbrightConfig::default())
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading {}", path.display());
        let contents = read_file(path)
            .await
            .error(&format!("Failed to read config file {}", path.display()))?;
        Ok(Self::parse(&contents))
    }

    /// Parse the flat `key = value` format. Never fails: anything unusable
    /// keeps its default and is reported with a warning.
    pub fn parse(contents: &str) -> Self {
        let mut config = Self::default();

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("line {}: expected key=value, got {line:?}", number + 1);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "enable_camera" => config.enable_camera = parse_bool(value),
                "use_logind" => config.use_logind = parse_bool(value),
                "smoothing_factor" => {
                    if let Some(factor) =
                        parse_value(key, value, |f: &f64| *f > 0.0 && *f <= 1.0)
                    {
                        config.smoothing_factor = factor;
                    }
                }
                "update_interval" => {
                    if let Some(secs) = parse_value(key, value, |s: &f64| {
                        Duration::try_from_secs_f64(*s).is_ok_and(|d| !d.is_zero())
                    }) {
                        config.update_interval = Duration::from_secs_f64(secs);
                    }
                }
                "min_brightness" => {
                    if let Some(min) =
                        parse_value(key, value, |b: &u8| BRIGHTNESS_RANGE.contains(b))
                    {
                        config.min_brightness = min;
                    }
                }
                "max_brightness" => {
                    if let Some(max) =
                        parse_value(key, value, |b: &u8| BRIGHTNESS_RANGE.contains(b))
                    {
                        config.max_brightness = max;
                    }
                }
                _ => {
                    debug!("ignoring unknown key {key:?}");
                }
            }
        }

        let config = config.validated();
        debug!("{:?}", config);
        config
    }

    /// A copy with every out of range value replaced by its default.
    /// The fields are public, so a config built in code may never have
    /// gone through [`AmbrightConfig::parse`].
    pub fn validated(&self) -> Self {
        let defaults = Self::default();
        let mut config = self.clone();

        if !(config.smoothing_factor > 0.0 && config.smoothing_factor <= 1.0) {
            warn!(
                "smoothing_factor {} is out of range, using {}",
                config.smoothing_factor, defaults.smoothing_factor
            );
            config.smoothing_factor = defaults.smoothing_factor;
        }
        if config.update_interval.is_zero() {
            warn!(
                "update_interval can't be 0, using {:?}",
                defaults.update_interval
            );
            config.update_interval = defaults.update_interval;
        }
        if !BRIGHTNESS_RANGE.contains(&config.min_brightness) {
            warn!(
                "min_brightness {} is out of range, using {}",
                config.min_brightness, defaults.min_brightness
            );
            config.min_brightness = defaults.min_brightness;
        }
        if !BRIGHTNESS_RANGE.contains(&config.max_brightness) {
            warn!(
                "max_brightness {} is out of range, using {}",
                config.max_brightness, defaults.max_brightness
            );
            config.max_brightness = defaults.max_brightness;
        }
        if config.min_brightness > config.max_brightness {
            warn!(
                "min_brightness {} > max_brightness {}, using {} and {}",
                config.min_brightness,
                config.max_brightness,
                defaults.min_brightness,
                defaults.max_brightness
            );
            config.min_brightness = defaults.min_brightness;
            config.max_brightness = defaults.max_brightness;
        }

        config
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_value<T>(key: &str, value: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value.parse() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        Ok(_) => {
            warn!("{key} = {value} is out of range, keeping the default");
            None
        }
        Err(e) => {
            warn!("{key} = {value}: {e}, keeping the default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AmbrightConfig::parse("");
        assert!(config.enable_camera);
        assert_eq!(config.smoothing_factor, 0.3);
        assert_eq!(config.update_interval, Duration::from_secs(2));
        assert_eq!(config.min_brightness, 10);
        assert_eq!(config.max_brightness, 100);
    }

    #[test]
    fn reads_every_key() {
        let config = AmbrightConfig::parse(
            "# ambright\n\
             enable_camera = no\n\
             smoothing_factor=0.5\n\
             update_interval = 0.25\n\
             min_brightness = 20\n\
             max_brightness = 90\n\
             use_logind = FALSE\n",
        );
        assert_eq!(
            config,
            AmbrightConfig {
                enable_camera: false,
                smoothing_factor: 0.5,
                update_interval: Duration::from_millis(250),
                min_brightness: 20,
                max_brightness: 90,
                use_logind: false,
            }
        );
    }

    #[test]
    fn truthy_values_are_case_insensitive() {
        for value in ["true", "TRUE", "1", "Yes"] {
            let config = AmbrightConfig::parse(&format!("enable_camera={value}"));
            assert!(config.enable_camera, "{value}");
        }
        assert!(!AmbrightConfig::parse("enable_camera=on").enable_camera);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let config = AmbrightConfig::parse(
            "smoothing_factor = fast\n\
             update_interval = -1\n\
             min_brightness = 0\n\
             max_brightness = 300\n\
             no equals sign here\n\
             colour = blue\n",
        );
        assert_eq!(config, AmbrightConfig::default());
    }

    #[test]
    fn smoothing_factor_bounds() {
        assert_eq!(AmbrightConfig::parse("smoothing_factor=1").smoothing_factor, 1.0);
        assert_eq!(AmbrightConfig::parse("smoothing_factor=0").smoothing_factor, 0.3);
        assert_eq!(AmbrightConfig::parse("smoothing_factor=1.5").smoothing_factor, 0.3);
    }

    #[test]
    fn inverted_bounds_reset_to_defaults() {
        let config = AmbrightConfig::parse("min_brightness=80\nmax_brightness=30");
        assert_eq!(config.min_brightness, 10);
        assert_eq!(config.max_brightness, 100);
    }

    #[test]
    fn validated_repairs_configs_built_in_code() {
        let config = AmbrightConfig {
            smoothing_factor: f64::NAN,
            update_interval: Duration::ZERO,
            min_brightness: 0,
            max_brightness: 130,
            ..Default::default()
        }
        .validated();
        assert_eq!(config, AmbrightConfig::default());

        let inverted = AmbrightConfig {
            min_brightness: 80,
            max_brightness: 30,
            ..Default::default()
        }
        .validated();
        assert_eq!(inverted.min_brightness, 10);
        assert_eq!(inverted.max_brightness, 100);

        let fine = AmbrightConfig {
            smoothing_factor: 1.0,
            min_brightness: 40,
            max_brightness: 40,
            ..Default::default()
        };
        assert_eq!(fine.validated(), fine);
    }

    #[test]
    fn value_may_contain_equals() {
        let config = AmbrightConfig::parse("update_interval = 3 = 4\nmin_brightness=15");
        assert_eq!(config.update_interval, Duration::from_secs(2));
        assert_eq!(config.min_brightness, 15);
    }

    #[tokio::test]
    async fn loads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.conf");
        std::fs::write(&path, "min_brightness = 5\n").unwrap();

        let config = AmbrightConfig::load(&path).await.unwrap();
        assert_eq!(config.min_brightness, 5);
    }

    #[tokio::test]
    async fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AmbrightConfig::load(dir.path().join("nope.conf")).await.is_err());
    }
}
