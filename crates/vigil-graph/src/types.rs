use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNode {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A fact edge in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactNode {
    pub uuid: String,
    pub fact: String,
    #[serde(default)]
    pub source_node_uuid: Option<String>,
    #[serde(default)]
    pub target_node_uuid: Option<String>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

/// A fact paired with its semantic similarity to a query, in [0, 1].
///
/// How the similarity is computed is the graph's concern; the integration
/// layer only interprets the number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFact {
    pub fact: FactNode,
    pub similarity: f64,
}

/// One conversational event published for graph ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EpisodeParams {
    pub episode_body: String,
    pub source_description: String,
    pub reference_time: String,
    pub source: String,
    pub group_id: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EpisodeResult {
    #[serde(default)]
    pub nodes: Vec<EntityNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchParams {
    pub query: String,
    pub group_id: String,
    pub limit: usize,
    #[serde(default)]
    pub rerank_method: Option<String>,
    #[serde(default)]
    pub rerank_alpha: Option<f64>,
    #[serde(default)]
    pub recency_weight: Option<f64>,
    #[serde(default)]
    pub entity_values: Vec<String>,
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResults {
    #[serde(default)]
    pub nodes: Vec<EntityNode>,
    #[serde(default)]
    pub edges: Vec<FactNode>,
    #[serde(default)]
    pub facts: Vec<FactNode>,
}
