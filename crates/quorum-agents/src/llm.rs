//! Completion clients
//!
//! The external LLM API is a black box behind the `CompletionClient` trait:
//! an OpenAI-compatible HTTP implementation for real runs and a scripted
//! client for simulations and failure-path tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use consensus::{ChatTurn, WorkItem, WorkKind};

use crate::config::CompletionConfig;

/// Errors from processing a work item.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed completion response")]
    MalformedResponse,

    #[error("scripted failure for {0}")]
    Scripted(String),
}

/// Processes a single work item into its output text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, item: &WorkItem, history: &[ChatTurn])
        -> Result<String, ProcessError>;
}

/// OpenAI-compatible HTTP client (chat completions + embeddings).
pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}/{endpoint}", self.url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn chat(&self, item: &WorkItem, history: &[ChatTurn]) -> Result<String, ProcessError> {
        let mut messages: Vec<serde_json::Value> = history
            .iter()
            .map(|turn| json!({"role": turn.role, "content": turn.content}))
            .collect();
        messages.push(json!({"role": "user", "content": item.input}));

        let body = json!({"model": self.model, "messages": messages});
        let response: serde_json::Value = self
            .request("chat/completions")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(ProcessError::MalformedResponse)
    }

    async fn embed(&self, item: &WorkItem) -> Result<String, ProcessError> {
        let body = json!({"model": self.model, "input": item.input});
        let response: serde_json::Value = self
            .request("embeddings")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let vector = response["data"][0]["embedding"]
            .as_array()
            .ok_or(ProcessError::MalformedResponse)?;
        Ok(serde_json::Value::Array(vector.clone()).to_string())
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        item: &WorkItem,
        history: &[ChatTurn],
    ) -> Result<String, ProcessError> {
        match item.kind {
            WorkKind::Completion | WorkKind::Chat => self.chat(item, history).await,
            WorkKind::Embedding => self.embed(item).await,
        }
    }
}

/// Scripted client for simulation: echoes inputs, with optional per-item
/// failure budgets to exercise the retry path.
#[derive(Default)]
pub struct ScriptedClient {
    /// Remaining failures per item id.
    failures: Mutex<HashMap<String, u32>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given item fail `times` before succeeding.
    pub fn fail_item(self, id: impl Into<String>, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(id.into(), times);
        self
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        item: &WorkItem,
        history: &[ChatTurn],
    ) -> Result<String, ProcessError> {
        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&item.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProcessError::Scripted(item.id.clone()));
            }
        }
        drop(failures);

        Ok(match item.kind {
            WorkKind::Embedding => format!("[0.0, {}.0]", item.input.len()),
            _ => format!("echo[{}]: {}", history.len(), item.input),
        })
    }
}
