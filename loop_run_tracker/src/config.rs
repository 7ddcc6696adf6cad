use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::TimeDelta;
use loop_run_lib::{LoopValidator, CLOSURE_THRESHOLD_METERS};
use thiserror::Error;

use crate::{ledger::DEFAULT_CONTEST_DAYS, ticker::DEFAULT_TICK_INTERVAL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: expected `key = value`")]
    Syntax { line: usize },
    #[error("line {line}: invalid value {value:?} for {key}")]
    InvalidValue { line: usize, key: String, value: String },
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub tick_interval: Duration,
    pub closure_threshold_meters: f64,
    /// Delay between replayed fixes. Zero replays as fast as possible.
    pub replay_interval: Duration,
    pub submitter_address: String,
    pub contest_duration: TimeDelta,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            closure_threshold_meters: CLOSURE_THRESHOLD_METERS,
            replay_interval: Duration::ZERO,
            submitter_address: String::new(),
            contest_duration: TimeDelta::days(DEFAULT_CONTEST_DAYS),
        }
    }
}

impl TrackerConfig {
    /// Parses `key = value` lines. Blank lines and `#` comments are skipped,
    /// missing keys keep their defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: line_number });
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "tick_interval_ms" => {
                    config.tick_interval = Duration::from_millis(parse_value(line_number, key, value)?);
                }
                "closure_threshold_meters" => {
                    let threshold: f64 = parse_value(line_number, key, value)?;
                    if !threshold.is_finite() || threshold < 0. {
                        return Err(invalid(line_number, key, value));
                    }
                    config.closure_threshold_meters = threshold;
                }
                "replay_interval_ms" => {
                    config.replay_interval = Duration::from_millis(parse_value(line_number, key, value)?);
                }
                "submitter_address" => config.submitter_address = value.to_string(),
                "contest_days" => {
                    let days: u32 = parse_value(line_number, key, value)?;
                    config.contest_duration = TimeDelta::days(days.into());
                }
                _ => tracing::warn!("Unknown config key: {key}"),
            }
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn validator(&self) -> LoopValidator {
        LoopValidator::new(self.closure_threshold_meters)
    }
}

fn parse_value<T: FromStr>(line: usize, key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(line, key, value))
}

fn invalid(line: usize, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        line,
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = TrackerConfig::parse("").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.validator().threshold_meters(), 50.);
        assert_eq!(config.contest_duration, TimeDelta::days(15));
    }

    #[test]
    fn parses_every_key() {
        let text = "
            # replay settings
            tick_interval_ms = 250
            closure_threshold_meters = 75.5
            replay_interval_ms=10

            submitter_address = GRUNNER
            contest_days = 7
            colour = blue
        ";

        let config = TrackerConfig::parse(text).unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.closure_threshold_meters, 75.5);
        assert_eq!(config.replay_interval, Duration::from_millis(10));
        assert_eq!(config.submitter_address, "GRUNNER");
        assert_eq!(config.contest_duration, TimeDelta::days(7));
    }

    #[test]
    fn line_without_separator_is_rejected() {
        assert!(matches!(
            TrackerConfig::parse("tick_interval_ms = 5\nnonsense"),
            Err(ConfigError::Syntax { line: 2 })
        ));
    }

    #[test]
    fn malformed_values_are_rejected() {
        for text in [
            "tick_interval_ms = soon",
            "closure_threshold_meters = -1",
            "closure_threshold_meters = NaN",
            "contest_days = -3",
        ] {
            let err = TrackerConfig::parse(text).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { line: 1, .. }), "{text}: {err}");
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = TrackerConfig::load(Path::new("does/not/exist.conf")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.conf"));
    }
}
