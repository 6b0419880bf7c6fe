//! Turns `tracing` events into [`LogRecord`]s for the layers that write
//! structured records (JSON file, Loki).

use crate::domain::model::{LogRecord, Severity};
use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::Event;

/// Event fields win over `default_fields` on a name clash.
pub fn from_event(event: &Event<'_>, default_fields: &Map<String, Value>) -> LogRecord {
    let mut record = LogRecord::new(Severity::from(event.metadata().level()), String::new());
    event.record(&mut RecordVisitor {
        record: &mut record,
    });
    for (key, value) in default_fields {
        record
            .fields
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    record
}

struct RecordVisitor<'a> {
    record: &'a mut LogRecord,
}

impl RecordVisitor<'_> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.record.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.insert(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.record.message = value.to_string();
        } else {
            self.insert(field, value.into());
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.record.message = format!("{:?}", value);
        } else {
            self.insert(field, format!("{:?}", value).into());
        }
    }
}
