//! `vigil-graph` — narrow adapter to the external knowledge graph.
//!
//! The core never depends on the graph's concrete schema; everything it
//! needs fits the [`GraphAdapter`] trait. The production implementation is
//! an HTTP client ([`client::HttpGraph`]); tests inject in-memory doubles.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::HttpGraph;
pub use error::{GraphError, Result};
pub use types::{EntityNode, EpisodeParams, EpisodeResult, FactNode, ScoredFact, SearchParams, SearchResults};

/// Operations the core requires of the knowledge graph.
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    /// Publish a conversational episode for ingestion.
    async fn add_episode(&self, params: &EpisodeParams) -> Result<EpisodeResult>;

    /// Hybrid search across nodes, edges, and facts.
    async fn search(&self, params: &SearchParams) -> Result<SearchResults>;

    /// Breadth-first expansion from a set of entity uuids.
    async fn node_bfs(
        &self,
        entity_uuids: &[String],
        group_id: &str,
        max_depth: u32,
        limit: usize,
    ) -> Result<Vec<EntityNode>>;

    /// Facts directly connected to any of the given entities.
    async fn facts_by_entities(
        &self,
        entity_uuids: &[String],
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<FactNode>>;

    /// Fact search scored by semantic similarity to the query.
    async fn hybrid_fact_search(
        &self,
        query: &str,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredFact>>;

    /// Node search by name/alias; used for entity resolution.
    async fn hybrid_node_search(
        &self,
        query: &str,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<EntityNode>>;

    /// Commit one fact.
    async fn add_fact(
        &self,
        fact: &str,
        group_id: &str,
        source: &str,
        attributes: &serde_json::Value,
    ) -> Result<FactNode>;

    /// Liveness probe; callers degrade gracefully when false.
    async fn available(&self) -> bool;
}
