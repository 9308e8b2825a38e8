//! Severity levels.
//!
//! Levels form a totally ordered set by integer weight. `Silent` is a
//! sentinel above every real level so a logger configured at `Silent` never
//! emits. `Audit` is weight-equal to `Info` for comparisons but the emitter
//! bypasses the comparison entirely (see [`Level::is_audit`]).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A log severity label with a fixed, strictly increasing weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    /// Bypasses level gating entirely; always emitted unless the logger is `Silent`.
    Audit,
    Warn,
    Error,
    Fatal,
    /// Disables all output; no record ever satisfies this threshold.
    Silent,
}

impl Level {
    /// Integer weight used for threshold comparisons. `Audit` carries the
    /// same weight as `Info` — the emitter never actually compares audit
    /// records against a threshold, but the weight keeps `Ord` well defined.
    pub const fn weight(self) -> u8 {
        match self {
            Level::Trace => 10,
            Level::Debug => 20,
            Level::Info => 30,
            Level::Audit => 30,
            Level::Warn => 40,
            Level::Error => 50,
            Level::Fatal => 60,
            Level::Silent => u8::MAX,
        }
    }

    /// True for the sentinel that disables all output.
    pub const fn is_silent(self) -> bool {
        matches!(self, Level::Silent)
    }

    /// True for the level that bypasses threshold gating.
    pub const fn is_audit(self) -> bool {
        matches!(self, Level::Audit)
    }

    /// The wire/label representation, e.g. `"warn"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Audit => "audit",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
            Level::Silent => "silent",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`Level::from_str`] for an unrecognized label.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown level label '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "audit" => Ok(Level::Audit),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            "silent" => Ok(Level::Silent),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// `is-enabled(level, threshold)` predicate from spec §4.1. Audit always
/// passes unless the threshold itself is `Silent`.
pub fn is_enabled(level: Level, threshold: Level) -> bool {
    if threshold.is_silent() {
        return false;
    }
    if level.is_audit() {
        return true;
    }
    level.weight() >= threshold.weight()
}
