use crate::domain::model::Emission;
use crate::domain::ports::LogSink;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Keeps every emission in memory together with the (tokio) time it arrived.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<(Instant, Emission)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.timed().into_iter().map(|(_, emission)| emission).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, Emission)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, emission: &Emission) {
        let entry = (Instant::now(), emission.clone());
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
