//! `vigil-queue` — the background runtime over the model-job queue.
//!
//! The store owns the claim/retry/complete protocol; this crate supplies
//! the workers that drive it and the reaper that recovers abandoned
//! leases. Job semantics are injected through [`JobHandler`], so the
//! runtime stays ignorant of what a "summary" or "exploration" job does.

pub mod error;
pub mod worker;

pub use error::{QueueError, Result};
pub use worker::{JobHandler, WorkerPool};
