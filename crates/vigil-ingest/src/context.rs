//! Materialized context assembly.
//!
//! Builds the per-session context blob from core memory, recent
//! conversation, and graph search, then caches it. The build degrades
//! instead of failing: an unreachable graph yields `Unavailable` with an
//! empty context so frontends stay functional.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use vigil_graph::{GraphAdapter, SearchParams};
use vigil_store::Store;

/// Hard cap on the rendered context blob.
const MAX_CONTEXT_CHARS: usize = 12_000;
/// Graph results folded into the context per build.
const GRAPH_RESULT_LIMIT: usize = 15;
/// Recent messages folded into the context per build.
const RECENT_MESSAGE_LIMIT: i64 = 10;

/// Manifest files that mark a working directory as a code project.
const PROJECT_MANIFESTS: &[&str] = &[
    "pyproject.toml",
    "package.json",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "mix.exs",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Ok,
    /// The graph was unreachable; context is empty but the call succeeded.
    Unavailable,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub status: BuildStatus,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Code,
    Conversational,
}

pub struct ContextBuilder {
    store: Arc<Store>,
    graph: Arc<dyn GraphAdapter>,
    group_id: String,
}

impl ContextBuilder {
    pub fn new(store: Arc<Store>, graph: Arc<dyn GraphAdapter>, group_id: String) -> Self {
        Self {
            store,
            graph,
            group_id,
        }
    }

    /// Build and cache the context for a session around the current prompt.
    pub async fn build(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        current_prompt: &str,
        depth: usize,
    ) -> BuiltContext {
        if !self.graph.available().await {
            return BuiltContext {
                status: BuildStatus::Unavailable,
                context: String::new(),
            };
        }
        match self
            .assemble(session_id, user_id, current_prompt, depth)
            .await
        {
            Ok(context) => {
                if let Err(e) = self.store.put_context(
                    session_id,
                    &context,
                    &json!({"prompt": current_prompt, "depth": depth}),
                ) {
                    warn!(error = %e, "context cache write failed");
                }
                BuiltContext {
                    status: BuildStatus::Ok,
                    context,
                }
            }
            Err(e) => BuiltContext {
                status: BuildStatus::Error(e),
                context: String::new(),
            },
        }
    }

    /// Session-start context: type detection plus a light memory preamble.
    pub async fn build_session_start(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        working_dir: Option<&str>,
        medium: Option<&str>,
    ) -> (BuiltContext, SessionType, Option<String>) {
        let session_type = detect_session_type(working_dir, medium);
        let project_name = match session_type {
            SessionType::Code => working_dir
                .and_then(|d| Path::new(d).file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            SessionType::Conversational => None,
        };

        let mut out = String::new();
        if let Some(user_id) = user_id {
            match self.store.core_memory_blocks_for_user(user_id) {
                Ok(blocks) => {
                    for block in blocks {
                        push_section(&mut out, &format!("memory:{}", block.block_type), &block.content);
                    }
                }
                Err(e) => warn!(error = %e, "core memory read failed"),
            }
        }
        if let Some(name) = &project_name {
            push_section(&mut out, "project", name);
        }

        if !out.is_empty() {
            if let Err(e) = self.store.put_context(
                session_id,
                &out,
                &json!({"kind": "session_start", "session_type": session_type}),
            ) {
                warn!(error = %e, "session-start context cache write failed");
            }
        }
        let built = BuiltContext {
            status: BuildStatus::Ok,
            context: out,
        };
        (built, session_type, project_name)
    }

    async fn assemble(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        current_prompt: &str,
        depth: usize,
    ) -> std::result::Result<String, String> {
        let mut out = String::new();

        if let Some(user_id) = user_id {
            let blocks = self
                .store
                .core_memory_blocks_for_user(user_id)
                .map_err(|e| e.to_string())?;
            for block in blocks {
                push_section(&mut out, &format!("memory:{}", block.block_type), &block.content);
            }
        }

        let recent = self
            .store
            .last_messages(session_id, RECENT_MESSAGE_LIMIT)
            .map_err(|e| e.to_string())?;
        if !recent.is_empty() {
            let mut lines = String::new();
            for msg in &recent {
                lines.push_str(&format!("{}: {}\n", msg.role, truncate(&msg.prompt, 200)));
            }
            push_section(&mut out, "recent conversation", &lines);
        }

        let results = self
            .graph
            .search(&SearchParams {
                query: current_prompt.to_string(),
                group_id: self.group_id.clone(),
                limit: GRAPH_RESULT_LIMIT * depth.max(1),
                ..Default::default()
            })
            .await
            .map_err(|e| e.to_string())?;
        if !results.facts.is_empty() || !results.nodes.is_empty() {
            let mut lines = String::new();
            for node in &results.nodes {
                if let Some(summary) = &node.summary {
                    lines.push_str(&format!("- {}: {}\n", node.name, truncate(summary, 200)));
                }
            }
            for fact in &results.facts {
                lines.push_str(&format!("- {}\n", truncate(&fact.fact, 240)));
            }
            push_section(&mut out, "knowledge", &lines);
        }

        if out.len() > MAX_CONTEXT_CHARS {
            out.truncate(MAX_CONTEXT_CHARS);
        }
        Ok(out)
    }
}

/// Medium and working directory decide the session flavour:
/// chat mediums and dirless sessions are conversational; a directory with
/// VCS metadata or a recognized manifest is a code session.
pub fn detect_session_type(working_dir: Option<&str>, medium: Option<&str>) -> SessionType {
    if matches!(medium, Some("discord") | Some("telegram")) {
        return SessionType::Conversational;
    }
    let Some(dir) = working_dir.filter(|d| !d.is_empty()) else {
        return SessionType::Conversational;
    };
    let root = Path::new(dir);
    if root.join(".git").exists() {
        return SessionType::Code;
    }
    if PROJECT_MANIFESTS.iter().any(|m| root.join(m).exists()) {
        return SessionType::Code;
    }
    SessionType::Conversational
}

fn push_section(out: &mut String, title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("## {title}\n{}\n", body.trim_end()));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_mediums_are_conversational_even_with_a_repo() {
        assert_eq!(
            detect_session_type(Some("/tmp"), Some("discord")),
            SessionType::Conversational
        );
        assert_eq!(
            detect_session_type(Some("/tmp"), Some("telegram")),
            SessionType::Conversational
        );
    }

    #[test]
    fn empty_working_dir_is_conversational() {
        assert_eq!(detect_session_type(None, None), SessionType::Conversational);
        assert_eq!(
            detect_session_type(Some(""), Some("cli")),
            SessionType::Conversational
        );
    }

    #[test]
    fn manifest_marks_a_code_session() {
        let dir = std::env::temp_dir().join(format!("vigil-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(
            detect_session_type(Some(dir.to_str().unwrap()), Some("cli")),
            SessionType::Code
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn plain_directory_is_conversational() {
        let dir = std::env::temp_dir().join(format!("vigil-plain-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(
            detect_session_type(Some(dir.to_str().unwrap()), Some("cli")),
            SessionType::Conversational
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
