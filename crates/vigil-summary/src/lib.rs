//! `vigil-summary` — the idle-session summary loop.
//!
//! Every few minutes: summarize sessions that went quiet, roll the
//! per-session summaries into a running "summary of summaries", and keep
//! the user-scoped `task` core-memory block current. Exactly one summary
//! worker runs per deployment; an in-process guard prevents overlap.

pub mod engine;
pub mod error;

pub use engine::SummaryLoop;
pub use error::{Result, SummaryError};
