//! `[log]` section
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "json"
//! filter = "flowd_sources=debug"
//! ```

use std::fmt;

use serde::Deserialize;

/// Minimum severity written to the log
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Includes one line per dropped datagram
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of log lines on stderr
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,

    pub format: LogFormat,

    /// Extra per-target directives appended to the level, e.g.
    /// `"flowd_pipeline=debug"`
    pub filter: Option<String>,
}

impl LogConfig {
    /// Filter directive for the subscriber
    ///
    /// A level given on the command line replaces the configured level; the
    /// configured per-target `filter` is kept either way.
    pub fn directive(&self, level_override: Option<&str>) -> String {
        let level = level_override.unwrap_or(self.level.as_str());
        match self.filter.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{level},{extra}"),
            _ => level.to_string(),
        }
    }
}
