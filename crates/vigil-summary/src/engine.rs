use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use vigil_core::config::SummaryConfig;
use vigil_llm::LlmAdapter;
use vigil_store::memory::BlockScope;
use vigil_store::types::Session;
use vigil_store::Store;

use crate::error::Result;

/// Sessions folded into one rolling-summary update.
const ROLLING_BATCH: usize = 20;

/// What one pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassReport {
    pub sessions_summarized: usize,
    pub rolling_updated: bool,
}

pub struct SummaryLoop {
    store: Arc<Store>,
    llm: Arc<dyn LlmAdapter>,
    config: SummaryConfig,
    /// Re-entry guard: a pass that is still running swallows the next tick.
    running: AtomicBool,
}

impl SummaryLoop {
    pub fn new(store: Arc<Store>, llm: Arc<dyn LlmAdapter>, config: SummaryConfig) -> Self {
        Self {
            store,
            llm,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Drive passes until shutdown. Pass errors are logged, never fatal.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("summary loop started");
        let period = std::time::Duration::from_secs(self.config.pass_interval_minutes * 60);
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.sessions_summarized > 0 => {
                            info!(
                                sessions = report.sessions_summarized,
                                rolling = report.rolling_updated,
                                "summary pass done"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("summary pass failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("summary loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One full pass: per-session summaries, rolling summary, core memory.
    pub async fn run_once(&self) -> Result<PassReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("summary pass already running; skipping tick");
            return Ok(PassReport::default());
        }
        let result = self.pass().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn pass(&self) -> Result<PassReport> {
        let mut report = PassReport::default();
        let candidates = self
            .store
            .sessions_needing_summary(self.config.lookback_hours, self.config.idle_cutoff_minutes)?;

        let mut touched_users: HashSet<String> = HashSet::new();
        let mut summarized: Vec<String> = Vec::new();
        for session in candidates {
            match self.summarize_session(&session).await {
                Ok(true) => {
                    report.sessions_summarized += 1;
                    summarized.push(session.id.clone());
                    if let Some(user_id) = &session.user_id {
                        touched_users.insert(user_id.clone());
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(session_id = %session.id, error = %e, "session summary failed"),
            }
        }

        if report.sessions_summarized > 0 {
            match self.update_rolling_summary().await {
                Ok(updated) => report.rolling_updated = updated,
                Err(e) => warn!(error = %e, "rolling summary update failed"),
            }
            for user_id in &touched_users {
                if let Err(e) = self.update_core_memory(user_id).await {
                    warn!(user_id = %user_id, error = %e, "core memory update failed");
                }
            }
        }
        Ok(report)
    }

    async fn summarize_session(&self, session: &Session) -> Result<bool> {
        let count = self.store.conversation_count(&session.id)?;
        if count < self.config.min_messages {
            return Ok(false);
        }
        let messages = self
            .store
            .last_messages(&session.id, self.config.max_messages)?;
        let mut transcript = String::new();
        for msg in &messages {
            transcript.push_str(&format!("{}: {}\n", msg.role, msg.prompt));
            if transcript.len() >= self.config.input_char_cap {
                transcript.truncate(self.config.input_char_cap);
                break;
            }
        }
        let prompt = format!(
            "Summarize this conversation in 1-2 sentences, focusing on what the \
             user worked on and cared about:\n\n{transcript}"
        );
        let summary = self.llm.text(&prompt).await?;
        self.store.set_session_summary(&session.id, summary.trim())?;
        Ok(true)
    }

    /// Merge newly summarized sessions into the summary-of-summaries.
    async fn update_rolling_summary(&self) -> Result<bool> {
        let previous = self.store.latest_summary_context()?;
        let known: HashSet<String> = previous
            .as_ref()
            .map(|p| p.session_ids.iter().cloned().collect())
            .unwrap_or_default();
        let fresh = self
            .store
            .recently_summarized_sessions(&known, ROLLING_BATCH)?;
        if fresh.is_empty() {
            return Ok(false);
        }

        let mut parts = String::new();
        if let Some(prev) = &previous {
            parts.push_str(&format!("Previous summary: {}\n", prev.summary));
        }
        for session in &fresh {
            if let Some(summary) = &session.summary {
                parts.push_str(&format!("- {summary}\n"));
            }
        }
        let prompt = format!(
            "Merge these conversation summaries into 1-2 sentences describing \
             what the user has been doing recently:\n\n{parts}"
        );
        let merged = self.llm.text(&prompt).await?;

        let mut ids: Vec<String> = known.into_iter().collect();
        ids.extend(fresh.iter().map(|s| s.id.clone()));
        self.store.add_summary_context(merged.trim(), &ids)?;
        Ok(true)
    }

    /// Keep the user-scoped `task` block carrying the latest recent-summary
    /// line, bounded by the block's char limit.
    async fn update_core_memory(&self, user_id: &str) -> Result<()> {
        let latest = self.store.latest_summary_context()?;
        let Some(latest) = latest else {
            return Ok(());
        };
        let scope = BlockScope::User(user_id.to_string());
        let existing = self.store.get_core_memory(&scope, "task")?;
        let limit = existing
            .as_ref()
            .map(|b| b.char_limit)
            .unwrap_or(self.config.char_limit);
        let content = compose_task_block(
            existing.as_ref().map(|b| b.content.as_str()),
            &format!("Recent summary: {}", latest.summary),
            limit as usize,
        );
        self.store.edit_core_memory(
            &scope,
            "task",
            &content,
            Some("summary pass"),
            Some(limit),
        )?;
        Ok(())
    }
}

/// Append `line` to the existing block content, dropping oldest lines (and
/// finally truncating the new line itself) so the result never exceeds
/// `limit` characters.
fn compose_task_block(existing: Option<&str>, line: &str, limit: usize) -> String {
    let line: String = line.chars().take(limit).collect();
    let mut lines: Vec<&str> = existing
        .unwrap_or_default()
        .lines()
        // A refreshed recent-summary line replaces the previous one.
        .filter(|l| !l.starts_with("Recent summary:"))
        .collect();
    loop {
        let prefix_len: usize = lines.iter().map(|l| l.chars().count() + 1).sum();
        if prefix_len + line.chars().count() <= limit {
            break;
        }
        if lines.is_empty() {
            return line;
        }
        lines.remove(0);
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&line);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use vigil_llm::LlmError;
    use vigil_store::sessions::NewSession;
    use vigil_store::types::Role;

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmAdapter for CannedLlm {
        async fn structured(&self, _p: &str, _s: &Value) -> vigil_llm::Result<Value> {
            Err(LlmError::Validation("not used".into()))
        }
        async fn text(&self, _p: &str) -> vigil_llm::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn config() -> SummaryConfig {
        SummaryConfig {
            pass_interval_minutes: 5,
            idle_cutoff_minutes: 30,
            lookback_hours: 24,
            min_messages: 5,
            max_messages: 50,
            input_char_cap: 2000,
            char_limit: 8192,
        }
    }

    #[tokio::test]
    async fn active_sessions_are_left_alone() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .ensure_session(&NewSession {
                id: "s1".to_string(),
                user_id: Some("alice".to_string()),
                ..Default::default()
            })
            .unwrap();
        for i in 0..8 {
            store
                .add_conversation("s1", Role::User, &format!("msg {i}"), None, Some("alice"), None, None)
                .unwrap();
        }
        let sloop = SummaryLoop::new(store.clone(), Arc::new(CannedLlm("sum")), config());
        // last_activity is now, inside the idle cutoff, so nothing qualifies.
        let report = sloop.run_once().await.unwrap();
        assert_eq!(report.sessions_summarized, 0);
        assert!(store.get_session("s1").unwrap().summary.is_none());
    }

    #[test]
    fn compose_replaces_the_previous_recent_summary_line() {
        let out = compose_task_block(
            Some("Goals: ship vigil\nRecent summary: old news"),
            "Recent summary: new news",
            8192,
        );
        assert_eq!(out, "Goals: ship vigil\nRecent summary: new news");
    }

    #[test]
    fn compose_respects_the_char_limit() {
        let existing = "a\n".repeat(40);
        let out = compose_task_block(Some(&existing), "Recent summary: tail", 30);
        assert!(out.chars().count() <= 30);
        assert!(out.ends_with("Recent summary: tail"));
    }

    #[test]
    fn compose_truncates_an_oversized_line() {
        let out = compose_task_block(None, &"x".repeat(100), 10);
        assert_eq!(out.chars().count(), 10);
    }
}
