//! The conversation ingestor.

use std::sync::Arc;

use tracing::{debug, warn};

use vigil_curiosity::{CuriosityPipeline, TurnContext};
use vigil_graph::{EpisodeParams, GraphAdapter};
use vigil_store::conversations::NewBlock;
use vigil_store::sessions::NewSession;
use vigil_store::types::{BlockKind, Role};
use vigil_store::Store;

use crate::emotion::EmotionBuffer;
use crate::error::{IngestError, Result};

/// One capture call from a frontend.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub session_id: String,
    pub role: Role,
    pub prompt: String,
    pub medium: Option<String>,
    pub user_id: Option<String>,
    pub working_dir: Option<String>,
    pub personality: Option<String>,
    pub speaker_name: Option<String>,
    pub is_command: bool,
}

pub struct Ingestor {
    store: Arc<Store>,
    graph: Arc<dyn GraphAdapter>,
    curiosity: Arc<CuriosityPipeline>,
    emotions: Arc<EmotionBuffer>,
    group_id: String,
}

impl Ingestor {
    pub fn new(
        store: Arc<Store>,
        graph: Arc<dyn GraphAdapter>,
        curiosity: Arc<CuriosityPipeline>,
        emotions: Arc<EmotionBuffer>,
        group_id: String,
    ) -> Self {
        Self {
            store,
            graph,
            curiosity,
            emotions,
            group_id,
        }
    }

    /// Durably record one message and kick off the fan-out.
    ///
    /// Exactly one conversation row is written; a text block at ordinal 0
    /// follows when the prompt is non-empty. The session is created lazily
    /// and its activity clock bumped. Returns the conversation id.
    ///
    /// The fan-out (graph episode, emotion stimulus, curiosity signals)
    /// runs on a spawned task; its failures are logged, never propagated.
    pub async fn capture(&self, req: CaptureRequest) -> Result<String> {
        if req.session_id.is_empty() {
            return Err(IngestError::InvalidRequest("session_id is required".into()));
        }

        self.store.ensure_session(&NewSession {
            id: req.session_id.clone(),
            working_dir: req.working_dir.clone(),
            medium: req.medium.clone(),
            user_id: req.user_id.clone(),
            personality: req.personality.clone(),
            ..Default::default()
        })?;

        // The previous turns must be read before this row lands, so the
        // detectors see the right neighbours.
        let previous = self.store.last_messages(&req.session_id, 2)?;
        let previous_assistant_text = previous
            .iter()
            .rev()
            .find(|c| c.role == Role::Assistant)
            .map(|c| c.prompt.clone());
        let previous_user_text = previous
            .iter()
            .rev()
            .find(|c| c.role == Role::User)
            .map(|c| c.prompt.clone());

        let conversation = self.store.add_conversation(
            &req.session_id,
            req.role,
            &req.prompt,
            req.medium.as_deref(),
            req.user_id.as_deref(),
            None,
            None,
        )?;
        if !req.prompt.is_empty() {
            self.store.append_block(
                &conversation.id,
                BlockKind::Text,
                NewBlock {
                    text_content: Some(req.prompt.clone()),
                    ..Default::default()
                },
            )?;
        }
        self.store.touch_session(&req.session_id)?;
        if let Some(user_id) = &req.user_id {
            self.store.record_interaction(user_id)?;
        }

        let turn = TurnContext {
            session_id: req.session_id.clone(),
            conversation_id: conversation.id.clone(),
            user_id: req.user_id.clone().unwrap_or_default(),
            role: Some(req.role),
            text: req.prompt.clone(),
            previous_assistant_text,
            previous_user_text,
            is_command: req.is_command,
        };
        self.spawn_fan_out(req, turn);

        Ok(conversation.id)
    }

    fn spawn_fan_out(&self, req: CaptureRequest, turn: TurnContext) {
        let graph = self.graph.clone();
        let curiosity = self.curiosity.clone();
        let emotions = self.emotions.clone();
        let group_id = self.group_id.clone();

        tokio::spawn(async move {
            if req.prompt.is_empty() {
                return;
            }

            // Graph episode.
            let episode = EpisodeParams {
                episode_body: req.prompt.clone(),
                source_description: format!("conversation via {}", req.medium.as_deref().unwrap_or("unknown")),
                reference_time: chrono::Utc::now().to_rfc3339(),
                source: "conversation".to_string(),
                group_id,
                speaker_id: req.user_id.clone(),
                speaker_name: req.speaker_name.clone(),
                personality: req.personality.clone(),
            };
            if let Err(e) = graph.add_episode(&episode).await {
                warn!(error = %e, "episode publish failed");
            }

            // Emotion stimulus for user turns.
            if req.role == Role::User {
                let intensity = vigil_curiosity::emotion::intensity(&req.prompt);
                emotions.push(intensity, &req.prompt);
            }

            // Curiosity signals.
            match curiosity.process_turn(&turn).await {
                Ok(n) if n > 0 => debug!(signals = n, "curiosity fan-out done"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "curiosity fan-out failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vigil_graph::{
        EntityNode, EpisodeResult, FactNode, ScoredFact, SearchParams, SearchResults,
    };
    use vigil_store::tasks::BacklogLimits;

    struct NullGraph;

    #[async_trait]
    impl GraphAdapter for NullGraph {
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
            Ok(Vec::new())
        }
        async fn hybrid_node_search(
            &self,
            _q: &str,
            _g: &str,
            _l: usize,
        ) -> vigil_graph::Result<Vec<EntityNode>> {
            Ok(Vec::new())
        }
        async fn add_fact(
            &self,
            fact: &str,
            _g: &str,
            _s: &str,
            _a: &serde_json::Value,
        ) -> vigil_graph::Result<FactNode> {
            Ok(FactNode {
                uuid: "f".to_string(),
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

    fn ingestor() -> (Ingestor, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let graph: Arc<dyn GraphAdapter> = Arc::new(NullGraph);
        let curiosity = Arc::new(CuriosityPipeline::new(
            store.clone(),
            graph.clone(),
            BacklogLimits {
                max_pending_per_user: 100,
                max_pending_per_type: 25,
            },
            "default".to_string(),
        ));
        let ing = Ingestor::new(
            store.clone(),
            graph,
            curiosity,
            Arc::new(EmotionBuffer::new()),
            "default".to_string(),
        );
        (ing, store)
    }

    fn request(prompt: &str) -> CaptureRequest {
        CaptureRequest {
            session_id: "s1".to_string(),
            role: Role::User,
            prompt: prompt.to_string(),
            user_id: Some("alice".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn capture_writes_row_and_single_text_block() {
        let (ing, store) = ingestor();
        let conv_id = ing.capture(request("hello there")).await.unwrap();
        let blocks = store.blocks_for_conversation(&conv_id).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].ordinal, 0);
        assert_eq!(blocks[0].text_content.as_deref(), Some("hello there"));
        assert_eq!(store.conversation_count("s1").unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_prompt_writes_row_but_no_block() {
        let (ing, store) = ingestor();
        let conv_id = ing.capture(request("")).await.unwrap();
        assert!(store.blocks_for_conversation(&conv_id).unwrap().is_empty());
        assert_eq!(store.conversation_count("s1").unwrap(), 1);
    }

    #[tokio::test]
    async fn capture_creates_the_session_lazily() {
        let (ing, store) = ingestor();
        ing.capture(request("first contact")).await.unwrap();
        let session = store.get_session("s1").unwrap();
        assert_eq!(session.user_id.as_deref(), Some("alice"));
        assert!(session.end_time.is_none());
    }

    #[tokio::test]
    async fn missing_session_id_is_rejected() {
        let (ing, _) = ingestor();
        let mut req = request("hi");
        req.session_id = String::new();
        assert!(matches!(
            ing.capture(req).await,
            Err(IngestError::InvalidRequest(_))
        ));
    }
}
