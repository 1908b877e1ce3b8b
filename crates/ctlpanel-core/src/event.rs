//! Decoded application log events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log line, as named by the producing agents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    /// Any level name the console does not know, kept verbatim
    Other(String),
}

impl From<&str> for Severity {
    fn from(level: &str) -> Self {
        match level.to_ascii_uppercase().as_str() {
            "DEBUG" => Severity::Debug,
            "INFO" => Severity::Info,
            "WARNING" | "WARN" => Severity::Warning,
            "ERROR" => Severity::Error,
            "CRITICAL" | "FATAL" => Severity::Critical,
            _ => Severity::Other(level.to_string()),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Debug => f.write_str("DEBUG"),
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
            Severity::Critical => f.write_str("CRITICAL"),
            Severity::Other(level) => f.write_str(level),
        }
    }
}

/// One decoded application log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: Severity,
    /// Originating subsystem (e.g. `web_builder`)
    pub component: String,
    pub message: String,
    /// Producer-side timestamp, when the payload carried one
    pub emitted_at: Option<DateTime<Utc>>,
}

impl LogEvent {
    pub fn new(level: Severity, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            component: component.into(),
            message: message.into(),
            emitted_at: None,
        }
    }

    /// Console rendering: `LEVEL component | message`.
    pub fn display_line(&self) -> String {
        format!("{} {} | {}", self.level, self.component, self.message)
    }
}
