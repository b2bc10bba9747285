//! Logging configuration.
//!
//! Resolved from, in increasing precedence:
//! - Defaults
//! - Environment variables (SP_LOG, RUST_LOG, SP_LOG_FORMAT)
//! - Explicit overrides from the embedding application

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Environment variable naming the log level.
pub const LEVEL_ENV: &str = "SP_LOG";

/// Environment variable naming the log format.
pub const FORMAT_ENV: &str = "SP_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum level of ensemble events to emit.
///
/// `Trace` shows every weight update, `Debug` adds candidates re-entering
/// model selection, `Warn` covers rejected batches and `Error` numeric
/// failures and weight resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

const LEVELS: [(LogLevel, &str, LevelFilter); 6] = [
    (LogLevel::Trace, "trace", LevelFilter::TRACE),
    (LogLevel::Debug, "debug", LevelFilter::DEBUG),
    (LogLevel::Info, "info", LevelFilter::INFO),
    (LogLevel::Warn, "warn", LevelFilter::WARN),
    (LogLevel::Error, "error", LevelFilter::ERROR),
    (LogLevel::Off, "off", LevelFilter::OFF),
];

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        LEVELS[self as usize].1
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        let name = match s.as_str() {
            "warning" => "warn",
            "none" | "quiet" => "off",
            other => other,
        };
        LEVELS
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(level, _, _)| *level)
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        LEVELS[level as usize].2
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Include timestamps in human output.
    pub timestamps: bool,
    /// Include the emitting module in each line.
    pub targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            targets: false,
        }
    }
}

impl LogConfig {
    /// Config from the process environment and explicit overrides.
    pub fn from_env(level: Option<LogLevel>, format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), level, format)
    }

    /// Config from an arbitrary variable lookup and explicit overrides.
    ///
    /// SP_LOG takes precedence over RUST_LOG. Unparseable values are
    /// ignored.
    pub fn from_lookup<F>(lookup: F, level: Option<LogLevel>, format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LogConfig::default();

        if let Some(val) = lookup(LEVEL_ENV) {
            if let Ok(level) = val.parse::<LogLevel>() {
                config.level = level;
            }
        } else if let Some(level) = lookup("RUST_LOG").as_deref().and_then(rust_log_level) {
            config.level = level;
        }

        if let Some(val) = lookup(FORMAT_ENV) {
            if let Ok(format) = val.parse::<LogFormat>() {
                config.format = format;
            }
        }

        if let Some(level) = level {
            config.level = level;
        }
        if let Some(format) = format {
            config.format = format;
        }

        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn with_targets(mut self, enabled: bool) -> Self {
        self.targets = enabled;
        self
    }
}

/// The level a RUST_LOG directive list assigns to this crate.
///
/// A `sp_core=<level>` directive wins over a bare global level. Other
/// crates' directives are ignored.
fn rust_log_level(directives: &str) -> Option<LogLevel> {
    let mut global = None;
    for directive in directives.split(',').map(str::trim) {
        match directive.split_once('=') {
            Some((target, level)) if target == "sp_core" || target.starts_with("sp_core::") => {
                if let Ok(level) = level.parse() {
                    return Some(level);
                }
            }
            Some(_) => {}
            None => {
                if let Ok(level) = directive.parse() {
                    global = Some(level);
                }
            }
        }
    }
    global
}
