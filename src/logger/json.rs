//! JSON-lines logger

use serde_json::{Map, Value};
use std::io::Write;

use super::{Fields, Level, Logger, RequestContext, SharedSink};

/// Writes each event as one JSON object per line.
///
/// Output shape: `{"level":"info","time":1700000000,"message":"...",...fields}`
/// with `time` in Unix seconds. Fields bound through [`JsonLogger::with_context`]
/// are added to every event unless the event sets the same key itself.
pub struct JsonLogger {
    sink: SharedSink,
    min_level: Level,
    common: Fields,
}

impl JsonLogger {
    pub fn new(sink: SharedSink, min_level: Level) -> Self {
        Self {
            sink,
            min_level,
            common: Fields::new(),
        }
    }

    /// Logger sharing this sink whose events carry the fields of `ctx`
    pub fn with_context(&self, ctx: &RequestContext) -> Self {
        Self {
            sink: self.sink.clone(),
            min_level: self.min_level,
            common: ctx.common_fields(),
        }
    }

    fn render(&self, level: Level, msg: &str, mut fields: Fields) -> Value {
        for (key, value) in &self.common {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let mut event = Map::new();
        for (key, value) in fields {
            event.insert(key, value.to_json());
        }
        event.insert("level".to_string(), Value::from(level.as_str()));
        event.insert("time".to_string(), Value::from(chrono::Utc::now().timestamp()));
        event.insert("message".to_string(), Value::from(msg));
        Value::Object(event)
    }
}

impl Logger for JsonLogger {
    fn log(&self, level: Level, msg: &str, fields: Fields) {
        if level < self.min_level {
            return;
        }

        let Ok(mut line) = serde_json::to_vec(&self.render(level, msg, fields)) else {
            return;
        };
        line.push(b'\n');

        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        // Whole line in one write; errors are dropped.
        let _ = sink.write_all(&line);
        let _ = sink.flush();
    }
}
