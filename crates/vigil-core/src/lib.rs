//! `vigil-core` — shared foundation for the Vigil daemon.
//!
//! Holds the pieces every other crate needs: configuration loading,
//! the common error type, the event-sink capability, helpers for the
//! dynamic JSON columns (`extra`, `metadata`), and the sandbox runner
//! event contract.

pub mod config;
pub mod error;
pub mod events;
pub mod json;
pub mod sandbox;

pub use config::VigilConfig;
pub use error::{Result, VigilError};
pub use events::{EventSink, FanoutSink, LogSink};
