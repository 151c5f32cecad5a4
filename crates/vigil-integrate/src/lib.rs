//! `vigil-integrate` — the fact checker between exploration findings and
//! the knowledge graph.
//!
//! Candidate findings either land in the graph directly (clean facts) or
//! open contradiction reviews when an existing fact disagrees. A pending
//! review never commits its fact.

pub mod checker;
pub mod error;
pub mod resolve;

pub use checker::{FactChecker, Finding, IntegrationResult};
pub use error::{IntegrateError, Result};
