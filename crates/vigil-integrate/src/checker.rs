//! The integration decision: add clean facts, queue contradictions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use vigil_core::events::EventSink;
use vigil_graph::{FactNode, GraphAdapter};
use vigil_store::reviews::NewReview;
use vigil_store::types::{ContradictionReview, ReviewStatus};
use vigil_store::Store;

use crate::error::Result;
use crate::resolve;

/// Similarity band for candidate contradictions, inclusive at both ends.
/// Above the band means duplicate; below means unrelated.
pub const CONTRADICTION_BAND_LOW: f64 = 0.70;
pub const CONTRADICTION_BAND_HIGH: f64 = 0.95;

/// Cap on facts fetched per finding through entity connections.
const ENTITY_FACT_LIMIT: usize = 20;
/// Cap on facts fetched per finding through hybrid search.
const HYBRID_FACT_LIMIT: usize = 10;

/// One candidate fact awaiting integration.
#[derive(Debug, Clone)]
pub struct Finding {
    pub fact: String,
    pub entity_names: Vec<String>,
    pub source: String,
    pub context: Option<String>,
}

/// Tally of one integration batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IntegrationResult {
    pub added: usize,
    pub queued: usize,
    pub skipped: usize,
}

/// A (new fact, existing fact) pair inside the contradiction band.
#[derive(Debug, Clone)]
struct Candidate {
    existing: FactNode,
    similarity: f64,
    reason: String,
}

pub struct FactChecker {
    store: Arc<Store>,
    graph: Arc<dyn GraphAdapter>,
    sink: Arc<dyn EventSink>,
    group_id: String,
}

impl FactChecker {
    pub fn new(
        store: Arc<Store>,
        graph: Arc<dyn GraphAdapter>,
        sink: Arc<dyn EventSink>,
        group_id: String,
    ) -> Self {
        Self {
            store,
            graph,
            sink,
            group_id,
        }
    }

    /// Integrate a batch of findings. Per-finding failures are counted as
    /// skipped and never abort the rest of the batch.
    pub async fn integrate(&self, findings: &[Finding]) -> Result<IntegrationResult> {
        let mut result = IntegrationResult::default();
        for finding in findings {
            match self.integrate_one(finding).await {
                Ok(Outcome::Added) => result.added += 1,
                Ok(Outcome::Queued) => result.queued += 1,
                Ok(Outcome::Skipped) => result.skipped += 1,
                Err(e) => {
                    warn!(fact = %finding.fact, error = %e, "finding skipped");
                    result.skipped += 1;
                }
            }
        }
        info!(
            added = result.added,
            queued = result.queued,
            skipped = result.skipped,
            "integration batch done"
        );
        Ok(result)
    }

    /// Resolve a pending review; accepting resolutions commit the fact.
    pub async fn resolve_review(
        &self,
        review_id: &str,
        status: ReviewStatus,
        resolution: &str,
        resolver: &str,
    ) -> Result<ContradictionReview> {
        let review = self
            .store
            .resolve_review(review_id, status, resolution, resolver)?;
        if status.commits_fact() {
            self.graph
                .add_fact(
                    &review.new_fact,
                    &self.group_id,
                    review.source.as_deref().unwrap_or("review"),
                    &json!({"review_id": review.id}),
                )
                .await?;
            debug!(review_id = %review.id, "fact committed after review");
        }
        Ok(review)
    }

    async fn integrate_one(&self, finding: &Finding) -> Result<Outcome> {
        let entities =
            resolve::resolve_entities(self.graph.as_ref(), &finding.entity_names, &self.group_id)
                .await;
        let entity_uuids: Vec<String> = entities.into_iter().map(|e| e.uuid).collect();

        let candidates = self.gather_candidates(finding, &entity_uuids).await?;

        let mut contradictions = Vec::new();
        let mut duplicate = false;
        for c in candidates {
            if c.similarity > CONTRADICTION_BAND_HIGH {
                duplicate = true;
            } else if c.similarity >= CONTRADICTION_BAND_LOW {
                contradictions.push(c);
            }
            // Below the band: unrelated, ignore.
        }

        if !contradictions.is_empty() {
            for c in &contradictions {
                let review = self.store.create_review(&NewReview {
                    new_fact: finding.fact.clone(),
                    existing_fact_uuid: c.existing.uuid.clone(),
                    existing_fact: c.existing.fact.clone(),
                    similarity: c.similarity,
                    reason: Some(c.reason.clone()),
                    source: Some(finding.source.clone()),
                    context: finding.context.clone(),
                    entity_names: finding.entity_names.clone(),
                    group_id: self.group_id.clone(),
                })?;
                self.sink.emit(
                    "integration:contradiction_detected",
                    json!({
                        "review_id": review.id,
                        "new_fact": finding.fact,
                        "existing_fact": c.existing.fact,
                        "existing_fact_uuid": c.existing.uuid,
                        "similarity": c.similarity,
                    }),
                );
            }
            return Ok(Outcome::Queued);
        }

        if duplicate {
            debug!(fact = %finding.fact, "duplicate of an existing fact; skipped");
            return Ok(Outcome::Skipped);
        }

        self.graph
            .add_fact(
                &finding.fact,
                &self.group_id,
                &finding.source,
                &json!({"entity_names": finding.entity_names}),
            )
            .await?;
        Ok(Outcome::Added)
    }

    /// Two search strategies, merged and deduplicated by fact uuid:
    /// facts connected to the resolved entities, and a hybrid search with
    /// the finding text as query. Hybrid scores win over the lexical
    /// fallback used for unscored entity-connected facts.
    async fn gather_candidates(
        &self,
        finding: &Finding,
        entity_uuids: &[String],
    ) -> Result<Vec<Candidate>> {
        let mut by_uuid: HashMap<String, Candidate> = HashMap::new();

        if !entity_uuids.is_empty() {
            let connected = self
                .graph
                .facts_by_entities(entity_uuids, &self.group_id, ENTITY_FACT_LIMIT)
                .await?;
            for fact in connected {
                let similarity = resolve::lexical_similarity(&finding.fact, &fact.fact);
                by_uuid.insert(
                    fact.uuid.clone(),
                    Candidate {
                        existing: fact,
                        similarity,
                        reason: "entity-connected fact".to_string(),
                    },
                );
            }
        }

        let scored = self
            .graph
            .hybrid_fact_search(&finding.fact, &self.group_id, HYBRID_FACT_LIMIT)
            .await?;
        for s in scored {
            by_uuid.insert(
                s.fact.uuid.clone(),
                Candidate {
                    existing: s.fact,
                    similarity: s.similarity,
                    reason: "hybrid fact search".to_string(),
                },
            );
        }

        Ok(by_uuid.into_values().collect())
    }
}

enum Outcome {
    Added,
    Queued,
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vigil_graph::{
        EntityNode, EpisodeParams, EpisodeResult, GraphError, ScoredFact, SearchParams,
        SearchResults,
    };

    /// Graph double with a fixed scored-fact corpus and a write log.
    struct FixedGraph {
        scored: Vec<ScoredFact>,
        added: Mutex<Vec<String>>,
        fail_writes: bool,
    }

    impl FixedGraph {
        fn with_fact(fact: &str, similarity: f64) -> Self {
            Self {
                scored: vec![ScoredFact {
                    fact: FactNode {
                        uuid: "f-existing".to_string(),
                        fact: fact.to_string(),
                        source_node_uuid: None,
                        target_node_uuid: None,
                        attributes: None,
                    },
                    similarity,
                }],
                added: Mutex::new(Vec::new()),
                fail_writes: false,
            }
        }

        fn empty() -> Self {
            Self {
                scored: Vec::new(),
                added: Mutex::new(Vec::new()),
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl GraphAdapter for FixedGraph {
        async fn add_episode(&self, _p: &EpisodeParams) -> vigil_graph::Result<EpisodeResult> {
            Ok(EpisodeResult::default())
        }
        async fn search(&self, _p: &SearchParams) -> vigil_graph::Result<SearchResults> {
            Ok(SearchResults::default())
        }
        async fn node_bfs(
            &self,
            _u: &[String],
            _g: &str,
            _d: u32,
            _l: usize,
        ) -> vigil_graph::Result<Vec<EntityNode>> {
            Ok(Vec::new())
        }
        async fn facts_by_entities(
            &self,
            _u: &[String],
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
            Ok(self.scored.clone())
        }
        async fn hybrid_node_search(
            &self,
            query: &str,
            _g: &str,
            _l: usize,
        ) -> vigil_graph::Result<Vec<EntityNode>> {
            Ok(vec![EntityNode {
                uuid: format!("n-{query}"),
                name: query.to_string(),
                labels: Vec::new(),
                summary: None,
            }])
        }
        async fn add_fact(
            &self,
            fact: &str,
            _g: &str,
            _s: &str,
            _a: &serde_json::Value,
        ) -> vigil_graph::Result<FactNode> {
            if self.fail_writes {
                return Err(GraphError::Unavailable("write refused".to_string()));
            }
            self.added.lock().unwrap().push(fact.to_string());
            Ok(FactNode {
                uuid: "f-new".to_string(),
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

    struct CountingSink(Mutex<Vec<String>>);

    impl EventSink for CountingSink {
        fn emit(&self, kind: &str, _payload: serde_json::Value) {
            self.0.lock().unwrap().push(kind.to_string());
        }
    }

    fn checker(graph: FixedGraph) -> (FactChecker, Arc<Store>, Arc<CountingSink>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let c = FactChecker::new(
            store.clone(),
            Arc::new(graph),
            sink.clone(),
            "default".to_string(),
        );
        (c, store, sink)
    }

    fn paris_finding() -> Finding {
        Finding {
            fact: "Paris is the capital of Germany.".to_string(),
            entity_names: vec!["Paris".to_string()],
            source: "exploration".to_string(),
            context: None,
        }
    }

    #[tokio::test]
    async fn contradiction_in_band_is_queued_not_added() {
        let (c, store, sink) =
            checker(FixedGraph::with_fact("Paris is the capital of France.", 0.82));
        let result = c.integrate(&[paris_finding()]).await.unwrap();
        assert_eq!(
            result,
            IntegrationResult {
                added: 0,
                queued: 1,
                skipped: 0
            }
        );
        let reviews = store.pending_reviews("default", 10).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].status, ReviewStatus::Pending);
        assert_eq!(
            sink.0.lock().unwrap().as_slice(),
            ["integration:contradiction_detected"]
        );
    }

    #[tokio::test]
    async fn band_edges_are_inside() {
        for sim in [0.70, 0.95] {
            let (c, store, _) =
                checker(FixedGraph::with_fact("Paris is the capital of France.", sim));
            let result = c.integrate(&[paris_finding()]).await.unwrap();
            assert_eq!(result.queued, 1, "similarity {sim} must queue");
            assert_eq!(store.pending_reviews("default", 10).unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn above_band_is_duplicate_below_is_unrelated() {
        let (c, _, _) = checker(FixedGraph::with_fact("Paris is the capital of Germany.", 0.97));
        let result = c.integrate(&[paris_finding()]).await.unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.added, 0);

        let (c, _, _) = checker(FixedGraph::with_fact("The Seine floods in winter.", 0.30));
        let result = c.integrate(&[paris_finding()]).await.unwrap();
        assert_eq!(result.added, 1);
    }

    #[tokio::test]
    async fn write_failure_skips_without_aborting_batch() {
        let mut graph = FixedGraph::empty();
        graph.fail_writes = true;
        let (c, _, _) = checker(graph);
        let findings = vec![paris_finding(), paris_finding()];
        let result = c.integrate(&findings).await.unwrap();
        assert_eq!(result.skipped, 2);
    }

    #[tokio::test]
    async fn pending_review_never_commits_but_acceptance_does() {
        let (c, store, _) =
            checker(FixedGraph::with_fact("Paris is the capital of France.", 0.82));
        c.integrate(&[paris_finding()]).await.unwrap();
        let review = &store.pending_reviews("default", 10).unwrap()[0];

        let resolved = c
            .resolve_review(&review.id, ReviewStatus::AcceptedNew, "new fact wins", "human")
            .await
            .unwrap();
        assert_eq!(resolved.status, ReviewStatus::AcceptedNew);
    }
}
