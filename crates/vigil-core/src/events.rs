//! Event-sink capability.
//!
//! Components that produce domain events (e.g. the fact checker emitting
//! `integration:contradiction_detected`) receive a sink by injection instead
//! of reaching for a global emitter. Multiple consumers compose via
//! [`FanoutSink`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A single domain event: a kind string plus an arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: String,
    pub payload: Value,
}

/// Receives domain events. Implementations must never block the producer.
pub trait EventSink: Send + Sync {
    fn emit(&self, kind: &str, payload: Value);
}

/// Logs every event at debug level. Useful as the default sink.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, kind: &str, payload: Value) {
        debug!(kind, %payload, "event");
    }
}

/// Forwards events into a bounded mpsc channel without blocking.
/// Events are dropped with a warning when the channel is full.
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, kind: &str, payload: Value) {
        let event = Event {
            kind: kind.to_string(),
            payload,
        };
        if self.tx.try_send(event).is_err() {
            warn!(kind, "event channel full or closed — event dropped");
        }
    }
}

/// Fans one event out to every registered sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, kind: &str, payload: Value) {
        for sink in &self.sinks {
            sink.emit(kind, payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<String>>);

    impl EventSink for Recorder {
        fn emit(&self, kind: &str, _payload: Value) {
            self.0.lock().unwrap().push(kind.to_string());
        }
    }

    #[test]
    fn fanout_reaches_all_sinks() {
        let a = Arc::new(Recorder(Mutex::new(Vec::new())));
        let b = Arc::new(Recorder(Mutex::new(Vec::new())));
        let fan = FanoutSink::new(vec![a.clone(), b.clone()]);
        fan.emit("integration:contradiction_detected", Value::Null);
        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);
        sink.emit("a", Value::Null);
        // Second emit hits a full channel; must not panic or block.
        sink.emit("b", Value::Null);
    }
}
