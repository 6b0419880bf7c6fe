use crate::config::LoggingConfig;
use crate::core::schedule::{SchedulePolicy, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "log-sender")]
#[command(about = "Emits a heartbeat log record on a fixed or randomized cadence")]
pub struct CliConfig {
    #[arg(
        long,
        help = "Emit at a fixed interval instead of after a random delay",
        conflicts_with_all = ["min_delay_ms", "max_delay_ms"]
    )]
    pub interval_ms: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_MIN_DELAY_MS)]
    pub min_delay_ms: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_DELAY_MS)]
    pub max_delay_ms: u64,

    #[arg(long, default_value = "200", help = "Pause before exiting so logs can flush")]
    pub grace_ms: u64,

    #[arg(short, long, help = "Load schedule and logging settings from a TOML file instead of flags")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Append JSON-formatted records to this file")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn schedule(&self) -> Result<SchedulePolicy> {
        Ok(match self.interval_ms {
            Some(interval_ms) => SchedulePolicy::Fixed { interval_ms },
            None => SchedulePolicy::Randomized {
                min_delay_ms: self.min_delay_ms,
                max_delay_ms: self.max_delay_ms,
            },
        })
    }

    fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    fn logging(&self) -> Result<LoggingConfig> {
        let mut logging = LoggingConfig::from_env()?;
        if let Some(path) = &self.log_file {
            logging.log_file = Some(path.clone());
        }
        logging.verbose |= self.verbose;
        Ok(logging)
    }
}
