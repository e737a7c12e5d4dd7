//! Detector configuration.
//!
//! Values come from defaults, then an optional TOML file with a `[detector]`
//! table, then command-line overrides applied by the caller.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::{Hsv, HsvRange};
use crate::error::{ColorwatchError, ColorwatchResult};
use crate::notifier::{DEFAULT_ENDPOINT, DEFAULT_QUEUE_CAPACITY};

/// Minimum matching pixels (exclusive) for the color to count as present.
pub const DEFAULT_THRESHOLD: u32 = 500;

/// How the detector loop delivers notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// Block the loop on each request.
    #[default]
    Inline,
    /// Push into a bounded queue drained by a sender task.
    Queued,
}

impl FromStr for NotifyMode {
    type Err = ColorwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "queued" => Ok(Self::Queued),
            other => Err(ColorwatchError::config(format!(
                "unknown notify mode '{}' (expected 'inline' or 'queued')",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub endpoint: String,
    pub threshold: u32,
    pub lower: Hsv,
    pub upper: Hsv,
    pub notify_mode: NotifyMode,
    pub queue_capacity: usize,
    pub timeout_ms: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let blue = HsvRange::blue();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            threshold: DEFAULT_THRESHOLD,
            lower: blue.lower,
            upper: blue.upper,
            notify_mode: NotifyMode::Inline,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    detector: DetectorConfig,
}

impl DetectorConfig {
    /// Load from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> ColorwatchResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), ?config, "Loaded detector configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> ColorwatchResult<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.detector.validate()?;
        Ok(file.detector)
    }

    pub fn validate(&self) -> ColorwatchResult<()> {
        self.range()?;
        if self.endpoint.trim().is_empty() {
            return Err(ColorwatchError::config("endpoint must not be empty"));
        }
        if self.queue_capacity == 0 {
            return Err(ColorwatchError::config("queue_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn range(&self) -> ColorwatchResult<HsvRange> {
        HsvRange::new(self.lower, self.upper)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
