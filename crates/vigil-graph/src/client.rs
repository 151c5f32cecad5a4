use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::types::*;
use crate::GraphAdapter;

/// HTTP client for the knowledge-graph service.
///
/// Every operation is a JSON POST against a fixed path; non-2xx responses
/// surface as `Unavailable` so callers can degrade.
pub struct HttpGraph {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGraph {
    /// `base_url` must not end with a trailing slash.
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client, base_url }
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "graph request");
        let resp = self.client.post(&url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "graph API error");
            return Err(GraphError::Unavailable(format!("status {status}: {text}")));
        }
        let value: Value = resp.json().await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl GraphAdapter for HttpGraph {
    async fn add_episode(&self, params: &EpisodeParams) -> Result<EpisodeResult> {
        self.post("/episodes", &serde_json::to_value(params)?).await
    }

    async fn search(&self, params: &SearchParams) -> Result<SearchResults> {
        self.post("/search", &serde_json::to_value(params)?).await
    }

    async fn node_bfs(
        &self,
        entity_uuids: &[String],
        group_id: &str,
        max_depth: u32,
        limit: usize,
    ) -> Result<Vec<EntityNode>> {
        self.post(
            "/nodes/bfs",
            &json!({
                "entity_uuids": entity_uuids,
                "group_id": group_id,
                "max_depth": max_depth,
                "limit": limit,
            }),
        )
        .await
    }

    async fn facts_by_entities(
        &self,
        entity_uuids: &[String],
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<FactNode>> {
        self.post(
            "/facts/by_entities",
            &json!({
                "entity_uuids": entity_uuids,
                "group_id": group_id,
                "limit": limit,
            }),
        )
        .await
    }

    async fn hybrid_fact_search(
        &self,
        query: &str,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<ScoredFact>> {
        self.post(
            "/facts/hybrid_search",
            &json!({
                "query": query,
                "group_id": group_id,
                "limit": limit,
            }),
        )
        .await
    }

    async fn hybrid_node_search(
        &self,
        query: &str,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<EntityNode>> {
        self.post(
            "/nodes/hybrid_search",
            &json!({
                "query": query,
                "group_id": group_id,
                "limit": limit,
            }),
        )
        .await
    }

    async fn add_fact(
        &self,
        fact: &str,
        group_id: &str,
        source: &str,
        attributes: &Value,
    ) -> Result<FactNode> {
        #[derive(serde::Deserialize)]
        struct AddFactResponse {
            fact: FactNode,
        }
        let resp: AddFactResponse = self
            .post(
                "/facts",
                &json!({
                    "fact": fact,
                    "group_id": group_id,
                    "source": source,
                    "attributes": attributes,
                }),
            )
            .await?;
        Ok(resp.fact)
    }

    async fn available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "graph health probe failed");
                false
            }
        }
    }
}
