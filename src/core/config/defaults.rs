use std::fmt;
use std::time::Duration;

use crate::core::config::data::{Config, DEFAULT_SERVER_URL};
use crate::core::poller::BackoffSchedule;

const DEFAULT_TOAST_MS: u64 = 3000;
const DEFAULT_STICKY_HEADER_LINES: u16 = 2;

impl Config {
    /// Server URL with `--server` taking precedence over `QUIRE_SERVER`, then
    /// the config file.
    pub fn resolve_server_url(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| std::env::var("QUIRE_SERVER").ok().filter(|v| !v.is_empty()))
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    /// Zero values from a hand-edited file fall back to the defaults, so
    /// polling never spins without a delay.
    pub fn poll_schedule(&self) -> BackoffSchedule {
        let defaults = BackoffSchedule::default();
        BackoffSchedule {
            step: self
                .poll_step_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.step),
            cap: self
                .poll_cap_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.cap),
            slow_factor: self
                .poll_slow_factor
                .filter(|factor| *factor > 0)
                .unwrap_or(defaults.slow_factor),
        }
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms.unwrap_or(DEFAULT_TOAST_MS))
    }

    pub fn sticky_header_lines(&self) -> u16 {
        self.sticky_header_lines
            .unwrap_or(DEFAULT_STICKY_HEADER_LINES)
    }
}

/// Keys accepted by `quire set` and `quire unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerUrl,
    DefaultWorksheet,
    PollStepMs,
    PollCapMs,
    PollSlowFactor,
    ToastMs,
    StickyHeaderLines,
}

pub const ALL_KEYS: [ConfigKey; 7] = [
    ConfigKey::ServerUrl,
    ConfigKey::DefaultWorksheet,
    ConfigKey::PollStepMs,
    ConfigKey::PollCapMs,
    ConfigKey::PollSlowFactor,
    ConfigKey::ToastMs,
    ConfigKey::StickyHeaderLines,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKeyError {
    UnknownKey(String),
    InvalidValue { key: &'static str, value: String },
    ZeroValue(&'static str),
}

impl fmt::Display for ConfigKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKeyError::UnknownKey(key) => {
                let known: Vec<&str> = ALL_KEYS.iter().map(|k| k.name()).collect();
                write!(f, "Unknown config key '{key}'. Known keys: {}", known.join(", "))
            }
            ConfigKeyError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{value}' for {key}: expected a non-negative integer")
            }
            ConfigKeyError::ZeroValue(key) => write!(f, "{key} must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigKeyError {}

impl ConfigKey {
    pub fn parse(raw: &str) -> Result<Self, ConfigKeyError> {
        let normalized = raw.trim().replace('_', "-").to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == normalized)
            .ok_or_else(|| ConfigKeyError::UnknownKey(raw.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::ServerUrl => "server-url",
            ConfigKey::DefaultWorksheet => "default-worksheet",
            ConfigKey::PollStepMs => "poll-step-ms",
            ConfigKey::PollCapMs => "poll-cap-ms",
            ConfigKey::PollSlowFactor => "poll-slow-factor",
            ConfigKey::ToastMs => "toast-ms",
            ConfigKey::StickyHeaderLines => "sticky-header-lines",
        }
    }

    fn number<T: std::str::FromStr>(self, value: &str) -> Result<T, ConfigKeyError> {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigKeyError::InvalidValue {
                key: self.name(),
                value: value.to_string(),
            })
    }

    fn positive<T: std::str::FromStr + Default + PartialEq>(
        self,
        value: &str,
    ) -> Result<T, ConfigKeyError> {
        let parsed: T = self.number(value)?;
        if parsed == T::default() {
            return Err(ConfigKeyError::ZeroValue(self.name()));
        }
        Ok(parsed)
    }

    pub fn set(self, config: &mut Config, value: &str) -> Result<(), ConfigKeyError> {
        match self {
            ConfigKey::ServerUrl => {
                config.server_url = Some(crate::utils::url::normalize_base_url(value.trim()))
            }
            ConfigKey::DefaultWorksheet => config.default_worksheet = Some(value.trim().to_string()),
            ConfigKey::PollStepMs => config.poll_step_ms = Some(self.positive(value)?),
            ConfigKey::PollCapMs => config.poll_cap_ms = Some(self.positive(value)?),
            ConfigKey::PollSlowFactor => config.poll_slow_factor = Some(self.positive(value)?),
            ConfigKey::ToastMs => config.toast_ms = Some(self.number(value)?),
            ConfigKey::StickyHeaderLines => config.sticky_header_lines = Some(self.number(value)?),
        }
        Ok(())
    }

    pub fn unset(self, config: &mut Config) {
        match self {
            ConfigKey::ServerUrl => config.server_url = None,
            ConfigKey::DefaultWorksheet => config.default_worksheet = None,
            ConfigKey::PollStepMs => config.poll_step_ms = None,
            ConfigKey::PollCapMs => config.poll_cap_ms = None,
            ConfigKey::PollSlowFactor => config.poll_slow_factor = None,
            ConfigKey::ToastMs => config.toast_ms = None,
            ConfigKey::StickyHeaderLines => config.sticky_header_lines = None,
        }
    }
}
