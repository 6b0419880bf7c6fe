use crate::domain::model::{iso_timestamp, Emission};
use crate::domain::ports::LogSink;

/// Hands emissions to the global `tracing` subscriber, which fans them out to
/// the console, the JSON file and Loki.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, emission: &Emission) {
        match emission {
            Emission::Heartbeat {
                sequence,
                timestamp,
            } => tracing::info!(
                sequence = *sequence,
                timestamp = %iso_timestamp(timestamp),
                "{}",
                emission.message()
            ),
            Emission::Farewell { final_count } => {
                tracing::info!(final_count = *final_count, "{}", emission.message())
            }
        }
    }
}
