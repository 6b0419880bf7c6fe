use crate::adapters::event_record;
use crate::utils::error::Result;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Appends one JSON [`LogRecord`](crate::domain::model::LogRecord) per event,
/// the same line shape Loki receives.
pub struct JsonFileLayer {
    file: Mutex<File>,
    default_fields: Map<String, Value>,
}

impl JsonFileLayer {
    pub fn open(path: &Path, default_fields: Map<String, Value>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            default_fields,
        })
    }
}

impl<S: Subscriber> Layer<S> for JsonFileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let record = event_record::from_event(event, &self.default_fields);
        let Ok(line) = record.to_json_line() else {
            return;
        };
        // Write failures are dropped like any other fmt writer error.
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_lines_carry_default_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.jsonl");
        let mut defaults = Map::new();
        defaults.insert("service".to_string(), "issue-tester".into());
        let layer = JsonFileLayer::open(&path, defaults).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(sequence = 4u64, "API being used, all good");
            tracing::warn!(service = "override", "explicit field");
        });

        let lines: Vec<Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[0]["message"], "API being used, all good");
        assert_eq!(lines[0]["sequence"], 4);
        assert_eq!(lines[0]["service"], "issue-tester");
        assert!(lines[0]["@timestamp"].is_string());
        assert_eq!(lines[1]["service"], "override");
    }
}
