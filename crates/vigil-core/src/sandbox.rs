//! Sandbox runner event contract.
//!
//! The container runner itself is an external collaborator; the core only
//! consumes its event stream. Events arrive over a bounded mpsc channel with
//! an explicit close sentinel ([`SandboxEvent::Done`] or the channel
//! closing); cancellation is a separate signal observed between reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Default bound for sandbox event channels.
pub const SANDBOX_EVENT_BUFFER: usize = 64;

/// One event from a sandboxed tool run. Unknown kinds are dropped at the
/// deserialization boundary rather than surfacing as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SandboxEvent {
    Ready,
    SessionId { session_id: String },
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, output: Value },
    Done,
    Error { message: String },
}

impl SandboxEvent {
    /// Parse one wire event, ignoring unrecognised kinds.
    pub fn parse(raw: &Value) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }

    /// True when the stream must not produce further events after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SandboxEvent::Done | SandboxEvent::Error { .. })
    }
}

/// Create a bounded sandbox event channel.
pub fn event_channel() -> (mpsc::Sender<SandboxEvent>, mpsc::Receiver<SandboxEvent>) {
    mpsc::channel(SANDBOX_EVENT_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_event() {
        let raw = json!({"type": "text", "data": {"text": "hi"}});
        match SandboxEvent::parse(&raw) {
            Some(SandboxEvent::Text { text }) => assert_eq!(text, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let raw = json!({"type": "telemetry", "data": {}});
        assert!(SandboxEvent::parse(&raw).is_none());
    }

    #[test]
    fn done_and_error_are_terminal() {
        assert!(SandboxEvent::Done.is_terminal());
        assert!(SandboxEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!SandboxEvent::Ready.is_terminal());
    }
}
