//! Exploration kickoff: claim a curiosity task, investigate it, feed the
//! findings back through the fact checker.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use vigil_core::config::ExplorationConfig;
use vigil_graph::{GraphAdapter, SearchParams};
use vigil_integrate::{FactChecker, Finding};
use vigil_llm::LlmAdapter;
use vigil_store::findings::NewFinding;
use vigil_store::types::ProjectTask;
use vigil_store::Store;

use crate::error::Result;
use crate::state::DerivedState;

/// Graph results folded into the exploration prompt.
const SEARCH_LIMIT: usize = 10;
/// Agent id recorded on exploration claims.
const EXPLORER_AGENT: &str = "ambient-explorer";

#[derive(Debug, Deserialize)]
struct ExplorationOutput {
    findings: Vec<RawFinding>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    finding: String,
    confidence: f64,
    #[serde(default)]
    worth_sharing: bool,
    #[serde(default)]
    share_message: Option<String>,
    #[serde(default)]
    entity_names: Vec<String>,
}

fn findings_schema() -> Value {
    json!({
        "type": "object",
        "required": ["findings"],
        "properties": {
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["finding", "confidence"],
                    "properties": {
                        "finding": {"type": "string"},
                        "confidence": {"type": "number"},
                        "worth_sharing": {"type": "boolean"},
                        "share_message": {"type": "string"},
                        "entity_names": {"type": "array", "items": {"type": "string"}}
                    }
                }
            },
            "summary": {"type": "string"}
        }
    })
}

pub struct Explorer {
    store: Arc<Store>,
    graph: Arc<dyn GraphAdapter>,
    llm: Arc<dyn LlmAdapter>,
    checker: Arc<FactChecker>,
    config: ExplorationConfig,
    group_id: String,
}

impl Explorer {
    pub fn new(
        store: Arc<Store>,
        graph: Arc<dyn GraphAdapter>,
        llm: Arc<dyn LlmAdapter>,
        checker: Arc<FactChecker>,
        config: ExplorationConfig,
        group_id: String,
    ) -> Self {
        Self {
            store,
            graph,
            llm,
            checker,
            config,
            group_id,
        }
    }

    /// Run at most one exploration if every gate passes. Returns whether a
    /// task was claimed (the tick's one action).
    pub async fn maybe_run(&self, user_id: &str, state: DerivedState) -> Result<bool> {
        if !self.config.enabled || state == DerivedState::Engaged {
            return Ok(false);
        }
        if self.store.explorations_today(user_id)? >= self.config.max_per_day {
            return Ok(false);
        }
        if !self.idle_enough_or_forced(user_id)? {
            return Ok(false);
        }
        let Some(task) = self
            .store
            .claim_curiosity_task(user_id, "ambient", EXPLORER_AGENT)?
        else {
            return Ok(false);
        };

        info!(task_id = %task.id, topic = %task.title, "exploration started");
        if let Err(e) = self.run_exploration(user_id, &task).await {
            warn!(task_id = %task.id, error = %e, "exploration failed");
            self.store.release_task(&task.id, &e.to_string())?;
        }
        Ok(true)
    }

    /// Idle-enough by interaction age, or forced once too long has passed
    /// since the previous exploration (never having explored counts as
    /// overdue).
    fn idle_enough_or_forced(&self, user_id: &str) -> Result<bool> {
        let daemon = self.store.daemon_state(user_id)?;
        let now = chrono::Utc::now();

        let idle = match daemon
            .last_interaction_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        {
            Some(last) => {
                now.signed_duration_since(last.with_timezone(&chrono::Utc))
                    >= chrono::Duration::minutes(self.config.min_idle_minutes)
            }
            None => true,
        };
        if idle {
            return Ok(true);
        }

        let forced = match daemon
            .last_exploration_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        {
            Some(last) => {
                now.signed_duration_since(last.with_timezone(&chrono::Utc))
                    >= chrono::Duration::hours(self.config.max_hours_between_explorations)
            }
            None => true,
        };
        Ok(forced)
    }

    async fn run_exploration(&self, user_id: &str, task: &ProjectTask) -> Result<()> {
        let known = self
            .graph
            .search(&SearchParams {
                query: task.title.clone(),
                group_id: self.group_id.clone(),
                limit: SEARCH_LIMIT,
                ..Default::default()
            })
            .await
            .map(|r| {
                r.facts
                    .iter()
                    .map(|f| format!("- {}", f.fact))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let prompt = format!(
            "You are exploring the topic \"{}\" on behalf of your user.\n\
             Context from the conversation that raised it:\n{}\n\n\
             Already known:\n{}\n\n\
             Produce concrete findings: short factual statements with a \
             confidence in [0,1], whether each is worth proactively sharing, \
             and the entity names each involves.",
            task.title, task.description, known
        );
        let raw = self.llm.structured(&prompt, &findings_schema()).await?;
        let output: ExplorationOutput = serde_json::from_value(raw)
            .map_err(|e| crate::error::AmbientError::BadDecision(e.to_string()))?;

        let mut to_integrate = Vec::new();
        for f in &output.findings {
            self.store.add_finding(&NewFinding {
                task_id: task.id.clone(),
                finding: f.finding.clone(),
                source_context: Some(task.title.clone()),
                confidence: f.confidence.clamp(0.0, 1.0),
                worth_sharing: f.worth_sharing,
                share_message: f.share_message.clone(),
            })?;
            to_integrate.push(Finding {
                fact: f.finding.clone(),
                entity_names: if f.entity_names.is_empty() {
                    vec![task.title.clone()]
                } else {
                    f.entity_names.clone()
                },
                source: "exploration".to_string(),
                context: Some(task.description.clone()),
            });
        }
        let integration = self.checker.integrate(&to_integrate).await?;

        let notes = output.summary.clone().unwrap_or_else(|| {
            format!(
                "{} findings ({} added, {} queued)",
                output.findings.len(),
                integration.added,
                integration.queued
            )
        });
        self.store.complete_task(&task.id, "explored", Some(&notes))?;
        self.store.record_exploration(user_id)?;
        info!(
            task_id = %task.id,
            findings = output.findings.len(),
            added = integration.added,
            queued = integration.queued,
            "exploration done"
        );
        Ok(())
    }
}
