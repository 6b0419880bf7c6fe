use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogSenderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Loki push rejected with status {status}: {body}")]
    LokiPushError { status: u16, body: String },

    #[error("Emitter cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Io,
    Serialization,
    Lifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LogSenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LogSenderError::HttpError(_) | LogSenderError::LokiPushError { .. } => {
                ErrorCategory::Network
            }
            LogSenderError::IoError(_) => ErrorCategory::Io,
            LogSenderError::SerializationError(_) => ErrorCategory::Serialization,
            LogSenderError::ConfigValidationError { .. }
            | LogSenderError::InvalidConfigValueError { .. }
            | LogSenderError::MissingConfigError { .. } => ErrorCategory::Configuration,
            LogSenderError::InvalidTransition { .. } => ErrorCategory::Lifecycle,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Serialization => ErrorSeverity::High,
            ErrorCategory::Io | ErrorCategory::Lifecycle => ErrorSeverity::Critical,
        }
    }

    /// Process exit code used when the error aborts startup.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            LogSenderError::HttpError(_) => {
                "Check that the Loki host is reachable and GRAFANA_HOST is correct".to_string()
            }
            LogSenderError::LokiPushError { status, .. } if *status == 401 || *status == 403 => {
                "Check the GRAFANA_BASICAUTH credentials (expected user:password)".to_string()
            }
            LogSenderError::LokiPushError { .. } => {
                "Inspect the Loki response body; the push payload may be rejected".to_string()
            }
            LogSenderError::IoError(_) => {
                "Make sure the config or log file path exists and is writable".to_string()
            }
            LogSenderError::SerializationError(_) => {
                "A record could not be encoded as JSON; check structured fields".to_string()
            }
            LogSenderError::ConfigValidationError { field, .. }
            | LogSenderError::InvalidConfigValueError { field, .. } => {
                format!("Fix the '{}' setting and restart", field)
            }
            LogSenderError::MissingConfigError { field } => {
                format!("Provide a value for '{}'", field)
            }
            LogSenderError::InvalidTransition { .. } => {
                "Create a new emitter instead of restarting a used one".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach the log sink: {}", self),
            ErrorCategory::Io => format!("File access failed: {}", self),
            ErrorCategory::Serialization => format!("Could not encode log record: {}", self),
            ErrorCategory::Lifecycle => format!("Emitter misuse: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LogSenderError>;
