//! Configuration for the Activity Sensor Agent.

use crate::core::classifier::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the sensor agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accelerometer sampling rate in Hz
    pub sample_rate_hz: f64,

    /// Samples per window
    pub window_length: usize,

    /// How often the inference loop looks for a new window
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Which trained model to load
    pub model_kind: ModelKind,

    /// Directory holding `scaler.json` and the model artifacts
    pub models_dir: PathBuf,

    /// Upper bound on concurrently running inference tasks
    pub max_in_flight: usize,

    /// How predictions are written to stdout
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_hz: 40.0,
            window_length: 30,
            poll_interval: Duration::from_millis(100),
            model_kind: ModelKind::default(),
            models_dir: PathBuf::from("models"),
            max_in_flight: 4,
            output: OutputFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A file that parses but holds unusable values is rejected here rather
    /// than when the pipeline starts.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-sensor-agent")
            .join("config.json")
    }

    /// Check that every knob is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.checked_sample_interval()?;
        if self.window_length == 0 {
            return Err(ConfigError::Invalid("window length must be at least 1".into()));
        }
        self.checked_window_span()?;
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be non-zero".into()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid("max in-flight must be at least 1".into()));
        }
        Ok(())
    }

    /// Time between two consecutive sensor reads.
    ///
    /// Zero for a configuration that does not pass [`Config::validate`].
    pub fn sample_interval(&self) -> Duration {
        self.checked_sample_interval().unwrap_or_default()
    }

    /// Wall-clock span of one window.
    ///
    /// Zero for a configuration that does not pass [`Config::validate`].
    pub fn window_span(&self) -> Duration {
        self.checked_window_span().unwrap_or_default()
    }

    fn checked_sample_interval(&self) -> Result<Duration, ConfigError> {
        let rate = self.sample_rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sample rate must be positive, got {rate}"
            )));
        }
        match Duration::try_from_secs_f64(1.0 / rate) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(ConfigError::Invalid(format!(
                "sample rate {rate} Hz gives an unusable sampling interval"
            ))),
        }
    }

    fn checked_window_span(&self) -> Result<Duration, ConfigError> {
        let interval = self.checked_sample_interval()?;
        u32::try_from(self.window_length)
            .ok()
            .and_then(|length| interval.checked_mul(length))
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "window of {} samples is too long",
                    self.window_length
                ))
            })
    }
}

/// Prediction output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `Predicted movement: <label>`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format {other:?} (expected text or json)")),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
