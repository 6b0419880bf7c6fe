use crate::config::LoggingConfig;
use crate::core::schedule::SchedulePolicy;
use crate::domain::model::{Emission, LogRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Receives emitter output. Implementations must not block; delivery is best-effort.
pub trait LogSink: Send + Sync {
    fn emit(&self, emission: &Emission);
}

/// Source of the delay before the next randomized emission.
pub trait DelaySource: Send {
    fn next_delay(&mut self) -> Duration;
}

pub trait ConfigProvider: Send + Sync {
    fn schedule(&self) -> Result<SchedulePolicy>;
    fn grace_period(&self) -> Duration;
    fn logging(&self) -> Result<LoggingConfig>;
}

/// Delivers a batch of records to a remote aggregation sink.
#[async_trait]
pub trait RecordShipper: Send + Sync {
    async fn ship(&self, batch: &[LogRecord]) -> Result<()>;
}
