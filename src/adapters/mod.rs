// Adapters layer: concrete LogSink, RecordShipper and tracing layer implementations.

pub(crate) mod event_record;
pub mod json_file;
pub mod loki;
#[cfg(test)]
pub(crate) mod memory;
pub mod tracing_sink;
