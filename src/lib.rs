pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::tracing_sink::TracingSink;
pub use config::{toml_config::TomlConfig, LoggingConfig, LokiConfig, ResolvedConfig};
pub use crate::core::{
    emitter::{Emitter, Outcome},
    schedule::{SchedulePolicy, Ticker, UniformDelay},
    shutdown::{ShutdownHandle, ShutdownSignal},
};
pub use utils::error::{LogSenderError, Result};
