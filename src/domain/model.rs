use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const HEARTBEAT_MESSAGE: &str = "API being used, all good";
pub const FAREWELL_MESSAGE: &str = "Log sender shutting down";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    // Accepts the winston level names the original deployments used in LOG_LEVEL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "http" | "verbose" | "debug" => Ok(Severity::Debug),
            "silly" | "trace" => Ok(Severity::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::TRACE => Severity::Trace,
        }
    }
}

/// Lifecycle of one emitter. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterPhase {
    Idle,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for EmitterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmitterPhase::Idle => "idle",
            EmitterPhase::Running => "running",
            EmitterPhase::Draining => "draining",
            EmitterPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionState {
    pub sequence: u64,
    pub is_shutting_down: bool,
    pub phase: EmitterPhase,
}

impl Default for EmissionState {
    fn default() -> Self {
        Self {
            sequence: 0,
            is_shutting_down: false,
            phase: EmitterPhase::Idle,
        }
    }
}

/// One record produced by the emitter.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Heartbeat {
        sequence: u64,
        timestamp: DateTime<Utc>,
    },
    Farewell {
        final_count: u64,
    },
}

impl Emission {
    pub fn message(&self) -> &'static str {
        match self {
            Emission::Heartbeat { .. } => HEARTBEAT_MESSAGE,
            Emission::Farewell { .. } => FAREWELL_MESSAGE,
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Info
    }

    pub fn to_record(&self) -> LogRecord {
        let mut record = LogRecord::new(self.severity(), self.message());
        match self {
            Emission::Heartbeat {
                sequence,
                timestamp,
            } => {
                record.insert("sequence", *sequence);
                record.insert("timestamp", iso_timestamp(timestamp));
            }
            Emission::Farewell { final_count } => {
                record.insert("final_count", *final_count);
            }
        }
        record
    }
}

/// Structured record as it leaves the process: level, message, time and free-form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: Severity,
    pub message: String,
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
