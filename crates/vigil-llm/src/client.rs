use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{LlmError, Result};
use crate::{check_schema, LlmAdapter};

/// Chat-completions client against an OpenAI-compatible endpoint.
pub struct HttpLlm {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl HttpLlm {
    pub fn new(base_url: String, api_key: Option<String>, model: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    async fn chat(&self, body: Value) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "llm request");
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "llm API error");
            return Err(LlmError::Transport(format!("status {status}: {text}")));
        }
        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        api.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Transport("empty completion".into()))
    }
}

#[async_trait]
impl LlmAdapter for HttpLlm {
    async fn structured(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system",
                 "content": format!(
                     "Respond with a single JSON object matching this schema, no prose:\n{schema}")},
                {"role": "user", "content": prompt},
            ],
            "response_format": {"type": "json_object"},
        });
        let content = self.chat(body).await?;
        let value: Value = serde_json::from_str(content.trim())
            .map_err(|e| LlmError::Validation(format!("not valid JSON: {e}")))?;
        check_schema(&value, schema).map_err(LlmError::Validation)?;
        Ok(value)
    }

    async fn text(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        self.chat(body).await
    }
}
