//! `vigil-ingest` — durable capture of conversation turns and the fan-out
//! to the graph, the emotion buffer, and the curiosity pipeline.
//!
//! The capture path is the one hot write in the system: it records the
//! message, then hands everything else to a background task whose failures
//! are logged and absorbed, never surfaced to the frontend.

pub mod context;
pub mod emotion;
pub mod error;
pub mod ingestor;

pub use context::{BuildStatus, BuiltContext, ContextBuilder, SessionType};
pub use emotion::{EmotionBuffer, EmotionSummary, Stimulus};
pub use error::{IngestError, Result};
pub use ingestor::{CaptureRequest, Ingestor};
