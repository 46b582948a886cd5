use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::acu::{ElevationRange, DEFAULT_TIMEOUT};
use crate::astro::{NullPointingModel, ParametricPointingModel, PointingModel, Site};
use crate::attribute::{AccessLevel, DEFAULT_HISTORY_SIZE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub pointing: PointingConfig,
    #[serde(default)]
    pub web: Option<WebConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: Option<String>,
    /// Degrees east, `d:m:s` or decimal.
    pub longitude: String,
    pub latitude: String,
    #[serde(default)]
    pub height_m: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HardwareConfig {
    Acu {
        host: String,
        port: u16,
        #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
        timeout: Duration,
    },
    Simulated {
        #[serde(default)]
        slew_rate_deg_s: Option<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub tick: Duration,
    pub elevation_floor_deg: f64,
    pub elevation_range_deg: ElevationRange,
    pub history_size: usize,
    pub ready_tolerance_arcsec: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            elevation_floor_deg: 8.2,
            elevation_range_deg: ElevationRange::default(),
            history_size: DEFAULT_HISTORY_SIZE,
            ready_tolerance_arcsec: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointingConfig {
    pub parameters: Option<Vec<f64>>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub level: AccessLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Log every attribute update at info level.
    #[serde(default)]
    pub log_updates: bool,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.site()?;
        let control = &self.control;
        if control.tick.is_zero() {
            return Err(ConfigError::Invalid("control.tick must be positive".into()));
        }
        let range = control.elevation_range_deg;
        if range.min >= range.max {
            return Err(ConfigError::Invalid(format!(
                "elevation range {}..{} is empty",
                range.min, range.max
            )));
        }
        if range.min < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "elevation range minimum {} is below the horizon",
                range.min
            )));
        }
        if !range.contains(control.elevation_floor_deg) {
            return Err(ConfigError::Invalid(format!(
                "elevation floor {} outside range {}..{}",
                control.elevation_floor_deg, range.min, range.max
            )));
        }
        if control.ready_tolerance_arcsec <= 0.0 {
            return Err(ConfigError::Invalid(
                "ready_tolerance_arcsec must be positive".into(),
            ));
        }
        if self.pointing.parameters.is_some() && self.pointing.file.is_some() {
            return Err(ConfigError::Invalid(
                "pointing takes either parameters or file, not both".into(),
            ));
        }
        if let HardwareConfig::Simulated {
            slew_rate_deg_s: Some(rate),
        } = self.hardware
        {
            if rate <= 0.0 {
                return Err(ConfigError::Invalid("slew_rate_deg_s must be positive".into()));
            }
        }
        Ok(())
    }

    pub fn site(&self) -> Result<Site, ConfigError> {
        Site::from_strings(&self.site.longitude, &self.site.latitude, self.site.height_m)
            .map_err(|e| ConfigError::Invalid(format!("site: {}", e)))
    }

    pub fn pointing_model(&self) -> Result<Arc<dyn PointingModel>, ConfigError> {
        let model: Arc<dyn PointingModel> = match (&self.pointing.parameters, &self.pointing.file)
        {
            (Some(params), _) => Arc::new(ParametricPointingModel::new(params).map_err(invalid)?),
            (None, Some(path)) => {
                Arc::new(ParametricPointingModel::from_file(path).map_err(invalid)?)
            }
            (None, None) => Arc::new(NullPointingModel),
        };
        Ok(model)
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.web
            .as_ref()
            .and_then(|web| web.api_keys.iter().find(|k| k.key == key))
    }
}

fn invalid(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid(format!("pointing: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = "
site:
  longitude: \"102:47:45.6\"
  latitude: \"25:01:40.8\"
hardware:
  kind: simulated
";

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(
            config.hardware,
            HardwareConfig::Simulated {
                slew_rate_deg_s: None
            }
        );
        assert_eq!(config.control.tick, Duration::from_millis(200));
        assert_eq!(config.control.elevation_floor_deg, 8.2);
        assert_eq!(config.control.history_size, 100);
        assert!(config.web.is_none());
        assert!(!config.telemetry.log_updates);
        assert!((config.site().unwrap().latitude_deg - 25.028).abs() < 1e-9);
        assert_eq!(config.pointing_model().unwrap().describe(), "none");
    }

    #[test]
    fn full_config() {
        let yaml = "
site:
  name: Kunming
  longitude: \"102.796\"
  latitude: \"25.028\"
  height_m: 1950
hardware:
  kind: acu
  host: 192.168.1.10
  port: 4001
  timeout: 2s
control:
  tick: 500ms
  elevation_floor_deg: 10
  elevation_range_deg: { min: 2, max: 88 }
pointing:
  parameters: [0.01, 0.002]
web:
  bind: 127.0.0.1:9000
  api_keys:
    - key: secret
      name: night-shift
      level: operator
telemetry:
  log_updates: true
";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.hardware,
            HardwareConfig::Acu {
                host: "192.168.1.10".into(),
                port: 4001,
                timeout: Duration::from_secs(2),
            }
        );
        assert_eq!(config.control.tick, Duration::from_millis(500));
        assert_eq!(config.control.elevation_range_deg.max, 88.0);
        assert_eq!(config.control.ready_tolerance_arcsec, 10.0);
        assert!(config.pointing_model().unwrap().describe().starts_with("parametric"));
        let key = config.find_api_key("secret").unwrap();
        assert_eq!(key.level, AccessLevel::Operator);
        assert!(config.find_api_key("nope").is_none());
        assert!(config.telemetry.log_updates);
    }

    #[test]
    fn acu_timeout_defaults() {
        let yaml = "
site: { longitude: \"0\", latitude: \"0\" }
hardware: { kind: acu, host: localhost, port: 4001 }
";
        match Config::from_yaml(yaml).unwrap().hardware {
            HardwareConfig::Acu { timeout, .. } => assert_eq!(timeout, DEFAULT_TIMEOUT),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let floor = format!("{}control:\n  elevation_floor_deg: 95\n", MINIMAL);
        assert!(matches!(
            Config::from_yaml(&floor),
            Err(ConfigError::Invalid(_))
        ));

        let below_horizon = format!(
            "{}control:\n  elevation_floor_deg: -5\n  elevation_range_deg: {{ min: -10, max: 90 }}\n",
            MINIMAL
        );
        assert!(matches!(
            Config::from_yaml(&below_horizon),
            Err(ConfigError::Invalid(msg)) if msg.contains("below the horizon")
        ));

        let tick = format!("{}control:\n  tick: banana\n", MINIMAL);
        assert!(matches!(Config::from_yaml(&tick), Err(ConfigError::Yaml(_))));

        let latitude = MINIMAL.replace("25:01:40.8", "95");
        assert!(matches!(
            Config::from_yaml(&latitude),
            Err(ConfigError::Invalid(_))
        ));

        let unknown = MINIMAL.replace("simulated", "telepathic");
        assert!(Config::from_yaml(&unknown).is_err());
    }

    #[test]
    fn loads_pointing_file() {
        let mut model = tempfile::NamedTempFile::new().unwrap();
        writeln!(model, "0.01 0 0 0 0 0.02").unwrap();
        let mut config = tempfile::NamedTempFile::new().unwrap();
        write!(
            config,
            "{}pointing:\n  file: {}\n",
            MINIMAL,
            model.path().display()
        )
        .unwrap();
        let config = Config::from_file(config.path()).unwrap();
        let (d_az, d_el) = config.pointing_model().unwrap().correct(0.0, 45.0);
        assert!((d_az - 0.01).abs() < 1e-12);
        assert!((d_el - 0.02).abs() < 1e-12);
    }
}
