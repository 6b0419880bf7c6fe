use crate::adapters::json_file::JsonFileLayer;
use crate::adapters::loki::{self, WorkerStats};
use crate::config::LoggingConfig;
use crate::utils::error::{LogSenderError, Result};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the Loki worker handle alive for the lifetime of the process.
#[derive(Debug)]
pub struct LoggerGuard {
    loki_worker: Option<JoinHandle<WorkerStats>>,
}

impl LoggerGuard {
    pub fn forwards_to_loki(&self) -> bool {
        self.loki_worker.is_some()
    }
}

pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_directive()))
}

/// Console output always; JSON lines to `log_file` and Loki forwarding when configured.
/// Must be called from inside a tokio runtime when Loki is enabled.
pub fn init_logger(config: &LoggingConfig) -> Result<LoggerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let json_file = match &config.log_file {
        Some(path) => Some(JsonFileLayer::open(path, config.default_fields())?),
        None => None,
    };

    let (loki_layer, loki_worker) = match &config.loki {
        Some(loki_config) => {
            let (layer, worker) = loki::spawn(loki_config, config.default_fields())?;
            (Some(layer), Some(worker))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(console)
        .with(json_file)
        .with(loki_layer)
        .try_init()
        .map_err(|e| LogSenderError::ConfigValidationError {
            field: "logging".to_string(),
            message: format!("Logger already initialised: {}", e),
        })?;

    Ok(LoggerGuard { loki_worker })
}
