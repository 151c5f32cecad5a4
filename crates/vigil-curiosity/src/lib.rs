//! `vigil-curiosity` — turns conversation turns into prioritized
//! exploration tasks without unbounded backlog growth.
//!
//! Small deterministic detectors produce [`CuriositySignal`]s; the priority
//! function scores them; the pipeline dedupes and hands the batch to the
//! store, which upserts and enforces the backlog bounds in one transaction.

pub mod emotion;
pub mod error;
pub mod pipeline;
pub mod priority;
pub mod signals;

pub use error::{CuriosityError, Result};
pub use pipeline::CuriosityPipeline;
pub use signals::{CuriositySignal, SignalType, TurnContext};
