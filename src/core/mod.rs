pub mod emitter;
pub mod schedule;
pub mod shutdown;

pub use crate::domain::model::{Emission, EmissionState, EmitterPhase, LogRecord};
pub use crate::domain::ports::{ConfigProvider, DelaySource, LogSink, RecordShipper};
pub use crate::utils::error::Result;
