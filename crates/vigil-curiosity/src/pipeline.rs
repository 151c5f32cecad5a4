//! The curiosity pipeline: detectors → dedupe → scored upsert batch.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use vigil_graph::GraphAdapter;
use vigil_store::tasks::{BacklogLimits, CuriosityUpsert};
use vigil_store::types::Role;
use vigil_store::Store;

use crate::error::Result;
use crate::priority;
use crate::signals::{self, CuriositySignal, TurnContext, MAX_ENTITY_CANDIDATES};

pub struct CuriosityPipeline {
    store: Arc<Store>,
    graph: Arc<dyn GraphAdapter>,
    limits: BacklogLimits,
    group_id: String,
}

impl CuriosityPipeline {
    pub fn new(
        store: Arc<Store>,
        graph: Arc<dyn GraphAdapter>,
        limits: BacklogLimits,
        group_id: String,
    ) -> Self {
        Self {
            store,
            graph,
            limits,
            group_id,
        }
    }

    /// Mine one turn for signals and upsert the resulting tasks. Returns the
    /// number of signals that reached the store; zero signals means zero
    /// writes.
    pub async fn process_turn(&self, turn: &TurnContext) -> Result<usize> {
        // Command inputs from the user must not create curiosity tasks.
        if turn.is_command && turn.role == Some(Role::User) {
            return Ok(0);
        }

        let mut found: Vec<CuriositySignal> = Vec::new();
        if let Some(s) = signals::detect_correction(turn) {
            found.push(s);
        }
        if let Some(s) = signals::detect_emotional_peak(turn) {
            found.push(s);
        }
        if let Some(s) = signals::detect_knowledge_gap(turn) {
            found.push(s);
        }
        found.extend(self.detect_unfamiliar_entities(turn).await);

        // Within one ingestion, duplicate normalized topics collapse before
        // the upsert so trigger counts stay meaningful.
        let mut seen: HashSet<String> = HashSet::new();
        found.retain(|s| seen.insert(s.topic.to_lowercase()));

        if found.is_empty() {
            return Ok(0);
        }

        let upserts: Vec<CuriosityUpsert> = found
            .iter()
            .map(|signal| CuriosityUpsert {
                title: signal.topic.clone(),
                description: signal.context.clone(),
                curiosity_type: signal.signal_type.as_str().to_string(),
                score: priority::score(signal, 0, 0.0),
                priority_factors: priority::factors(signal, 0, 0.0),
                ttl_days: signal.signal_type.ttl_days(),
            })
            .collect();

        let count = upserts.len();
        let outcome = self
            .store
            .process_curiosity_batch(&turn.user_id, &upserts, self.limits)?;
        debug!(
            user_id = %turn.user_id,
            created = outcome.created,
            retriggered = outcome.retriggered,
            pruned = outcome.pruned,
            "curiosity batch processed"
        );
        Ok(count)
    }

    /// Entity candidates not present in the graph become unfamiliar-entity
    /// signals. Graph failures skip the detector rather than failing the turn.
    async fn detect_unfamiliar_entities(&self, turn: &TurnContext) -> Vec<CuriositySignal> {
        if turn.role != Some(Role::User) {
            return Vec::new();
        }
        let mut out = Vec::new();
        for entity in signals::candidate_entities(&turn.text)
            .into_iter()
            .take(MAX_ENTITY_CANDIDATES)
        {
            match self.graph.hybrid_node_search(&entity, &self.group_id, 1).await {
                Ok(nodes) if nodes.is_empty() => {
                    out.push(signals::unfamiliar_entity_signal(&entity, turn));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(entity = %entity, error = %e, "entity lookup failed; skipping");
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vigil_graph::{
        EntityNode, EpisodeParams, EpisodeResult, FactNode, ScoredFact, SearchParams,
        SearchResults,
    };

    /// Graph double that knows a fixed set of entity names.
    struct KnownEntities(Vec<&'static str>);

    #[async_trait]
    impl GraphAdapter for KnownEntities {
        async fn add_episode(&self, _p: &EpisodeParams) -> vigil_graph::Result<EpisodeResult> {
            Ok(EpisodeResult::default())
        }
        async fn search(&self, _p: &SearchParams) -> vigil_graph::Result<SearchResults> {
            Ok(SearchResults::default())
        }
        async fn node_bfs(
            &self,
            _uuids: &[String],
            _g: &str,
            _d: u32,
            _l: usize,
        ) -> vigil_graph::Result<Vec<EntityNode>> {
            Ok(Vec::new())
        }
        async fn facts_by_entities(
            &self,
            _uuids: &[String],
            _g: &str,
            _l: usize,
        ) -> vigil_graph::Result<Vec<FactNode>> {
            Ok(Vec::new())
        }
        async fn hybrid_fact_search(
            &self,
            _q: &str,
            _g: &str,
            _l: usize,
        ) -> vigil_graph::Result<Vec<ScoredFact>> {
            Ok(Vec::new())
        }
        async fn hybrid_node_search(
            &self,
            query: &str,
            _g: &str,
            _l: usize,
        ) -> vigil_graph::Result<Vec<EntityNode>> {
            if self.0.contains(&query) {
                Ok(vec![EntityNode {
                    uuid: "n-1".to_string(),
                    name: query.to_string(),
                    labels: Vec::new(),
                    summary: None,
                }])
            } else {
                Ok(Vec::new())
            }
        }
        async fn add_fact(
            &self,
            fact: &str,
            _g: &str,
            _s: &str,
            _a: &serde_json::Value,
        ) -> vigil_graph::Result<FactNode> {
            Ok(FactNode {
                uuid: "f-1".to_string(),
                fact: fact.to_string(),
                source_node_uuid: None,
                target_node_uuid: None,
                attributes: None,
            })
        }
        async fn available(&self) -> bool {
            true
        }
    }

    fn pipeline(known: Vec<&'static str>) -> (CuriosityPipeline, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let p = CuriosityPipeline::new(
            store.clone(),
            Arc::new(KnownEntities(known)),
            BacklogLimits {
                max_pending_per_user: 100,
                max_pending_per_type: 25,
            },
            "default".to_string(),
        );
        (p, store)
    }

    fn user_turn(text: &str) -> TurnContext {
        TurnContext {
            user_id: "alice".to_string(),
            role: Some(Role::User),
            text: text.to_string(),
            previous_assistant_text: Some("mysql, I think".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_signals_means_zero_writes() {
        let (p, store) = pipeline(vec![]);
        let n = p.process_turn(&user_turn("thanks")).await.unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.pending_curiosity_count("alice").unwrap(), 0);
    }

    #[tokio::test]
    async fn command_turns_are_suppressed() {
        let (p, store) = pipeline(vec![]);
        let mut turn = user_turn("no, it's actually Postgres");
        turn.is_command = true;
        assert_eq!(p.process_turn(&turn).await.unwrap(), 0);
        assert_eq!(store.pending_curiosity_count("alice").unwrap(), 0);
    }

    #[tokio::test]
    async fn known_entities_do_not_trigger() {
        let (p, store) = pipeline(vec!["Kubernetes"]);
        p.process_turn(&user_turn("we moved Kubernetes to Hetzner today"))
            .await
            .unwrap();
        let tasks = store.pending_curiosity_tasks("alice").unwrap();
        assert!(tasks.iter().any(|t| t.title == "Hetzner"));
        assert!(!tasks.iter().any(|t| t.title == "Kubernetes"));
    }

    #[tokio::test]
    async fn duplicate_topics_collapse_within_one_turn() {
        let (p, store) = pipeline(vec![]);
        // "Redis" appears twice; only one task may be created with a single
        // trigger recorded.
        p.process_turn(&user_turn("compare Redis against Redis cluster mode"))
            .await
            .unwrap();
        let tasks = store.pending_curiosity_tasks("alice").unwrap();
        let redis: Vec<_> = tasks.iter().filter(|t| t.title == "Redis").collect();
        assert_eq!(redis.len(), 1);
    }
}
