use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::error::ClockError;

pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://timezonedb.com/",
    "https://www.timeanddate.com/",
    "https://yandex.ru",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ClockConfig {
    /// Time endpoints in priority order.
    pub endpoints: Vec<String>,
    pub resync_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// Upper bound on pointer speed (pixels per second) fed into arrow rotation.
    pub max_arrow_speed: f64,
    pub user_agent: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|uri| uri.to_string()).collect(),
            resync_interval_ms: default_resync_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            max_arrow_speed: default_max_arrow_speed(),
            user_agent: format!("netclock/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClockConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ClockError> {
        if self.endpoints.is_empty() {
            return Err(ClockError::InvalidConfig(
                "at least one time endpoint is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.trim().is_empty() {
                return Err(ClockError::InvalidConfig("endpoint must not be blank".to_string()));
            }
            if !seen.insert(endpoint.as_str()) {
                return Err(ClockError::InvalidConfig(format!(
                    "duplicate endpoint: {endpoint}"
                )));
            }
        }
        if self.resync_interval_ms == 0 {
            return Err(ClockError::InvalidConfig(
                "resync_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ClockError::InvalidConfig(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !self.max_arrow_speed.is_finite() || self.max_arrow_speed <= 0.0 {
            return Err(ClockError::InvalidConfig(format!(
                "max_arrow_speed must be a positive number, got {}",
                self.max_arrow_speed
            )));
        }
        Ok(())
    }
}

pub fn load_clock_config(path: &Path) -> Result<ClockConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    parse_clock_config_text(&content)
}

pub fn parse_clock_config_text(content: &str) -> Result<ClockConfig> {
    let raw = serde_json::from_str::<ClockConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported clock config version {}; expected version 1",
            raw.version
        );
    }

    let defaults = ClockConfig::default();
    let config = ClockConfig {
        endpoints: raw.endpoints.unwrap_or(defaults.endpoints),
        resync_interval_ms: raw.resync_interval_ms,
        request_timeout_ms: raw.request_timeout_ms,
        max_arrow_speed: raw.max_arrow_speed,
        user_agent: raw.user_agent.unwrap_or(defaults.user_agent),
    };
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClockConfigFile {
    version: u32,
    #[serde(default)]
    endpoints: Option<Vec<String>>,
    #[serde(default = "default_resync_interval_ms")]
    resync_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default = "default_max_arrow_speed")]
    max_arrow_speed: f64,
    #[serde(default)]
    user_agent: Option<String>,
}

fn default_resync_interval_ms() -> u64 {
    3_600_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_arrow_speed() -> f64 {
    1.0
}
