use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::prompts;

/// Past exchanges replayed to the model per conversation.
const HISTORY_MAX_MESSAGES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// What the advisor sends to the reasoning service for one plain query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasoningRequest {
    pub session_id: String,
    pub message: String,
    pub active_round: u32,
    pub round_title: String,
    pub round_goal: String,
    pub continuation_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReasoningReply {
    pub content: String,
    #[serde(default)]
    pub tokens_used: Option<u32>,
    #[serde(default)]
    pub continuation_id: Option<String>,
}

/// The external service that answers open questions.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn reply(&self, request: &ReasoningRequest) -> Result<ReasoningReply>;

    /// Drop whatever is kept for a conversation that has ended.
    async fn forget(&self, _continuation_id: &str) {}
}

/// OpenAI-compatible chat completions client. Keeps a short per-conversation
/// history keyed by continuation ID so follow-up questions have context.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:1234/v1".to_string());
        let model =
            dotenv::var("LLM_MODEL").unwrap_or_else(|_| "qwen/qwen3-8b".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            model,
            api_key,
            conversations: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    /// Non-streaming chat completion. Returns the content and total tokens.
    pub async fn chat(&self, messages: &[Message]) -> Result<(String, Option<u32>)> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.3,
            "max_tokens": 2048,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.send().await.context("LLM request failed")?;
        let resp = resp
            .error_for_status()
            .context("LLM returned an error status")?;
        let text = resp.text().await.context("Failed to read LLM response")?;
        let json: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse LLM JSON")?;

        // Extract content from choices[0].message.content (handle null)
        let content = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .unwrap_or("")
            .to_string();
        let tokens = json["usage"]["total_tokens"]
            .as_u64()
            .map(|t| t.min(u32::MAX as u64) as u32);

        Ok((content, tokens))
    }
}

fn continuation_id_for(request: &ReasoningRequest) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(request.session_id.as_bytes());
    hasher.update(request.message.as_bytes());
    hasher.finalize().to_hex().as_str()[..24].to_string()
}

#[async_trait]
impl ReasoningService for LlmClient {
    async fn reply(&self, request: &ReasoningRequest) -> Result<ReasoningReply> {
        let continuation_id = request
            .continuation_id
            .clone()
            .unwrap_or_else(|| continuation_id_for(request));

        let history = {
            let conversations = self.conversations.read().await;
            conversations
                .get(&continuation_id)
                .cloned()
                .unwrap_or_default()
        };

        let mut messages = vec![Message {
            role: "system".to_string(),
            content: prompts::system_prompt(
                request.active_round,
                &request.round_title,
                &request.round_goal,
            ),
        }];
        messages.extend(history);
        let question = Message {
            role: "user".to_string(),
            content: request.message.clone(),
        };
        messages.push(question.clone());

        let (content, tokens_used) = self.chat(&messages).await?;
        debug!(
            continuation_id = %continuation_id,
            response_len = content.len(),
            tokens_used = ?tokens_used,
            "reasoning reply received"
        );

        {
            let mut conversations = self.conversations.write().await;
            let log = conversations.entry(continuation_id.clone()).or_default();
            log.push(question);
            log.push(Message {
                role: "assistant".to_string(),
                content: content.clone(),
            });
            let excess = log.len().saturating_sub(HISTORY_MAX_MESSAGES);
            log.drain(..excess);
        }

        Ok(ReasoningReply {
            content,
            tokens_used,
            continuation_id: Some(continuation_id),
        })
    }

    async fn forget(&self, continuation_id: &str) {
        let removed = self.conversations.write().await.remove(continuation_id);
        debug!(
            continuation_id = %continuation_id,
            messages = removed.map(|m| m.len()).unwrap_or(0),
            "conversation history dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> LlmClient {
        LlmClient {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            model: "m".to_string(),
            api_key: None,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    #[test]
    fn test_endpoint_resolution() {
        assert_eq!(
            client("http://localhost:1234/v1").endpoint(),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            client("https://api.example.com/").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            client("https://api.example.com/v1/chat/completions").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_forget_drops_history() {
        let llm = client("http://localhost:1234/v1");
        let message = Message {
            role: "user".to_string(),
            content: "hi".to_string(),
        };
        {
            let mut conversations = llm.conversations.write().await;
            conversations.insert("conv-a".to_string(), vec![message.clone()]);
            conversations.insert("conv-b".to_string(), vec![message]);
        }
        llm.forget("conv-a").await;
        llm.forget("unknown").await;

        let conversations = llm.conversations.read().await;
        assert!(!conversations.contains_key("conv-a"));
        assert!(conversations.contains_key("conv-b"));
    }

    #[test]
    fn test_continuation_id_is_stable() {
        let request = ReasoningRequest {
            session_id: "s".to_string(),
            message: "hello".to_string(),
            active_round: 1,
            round_title: "Situation".to_string(),
            round_goal: String::new(),
            continuation_id: None,
        };
        assert_eq!(continuation_id_for(&request), continuation_id_for(&request));
        assert_eq!(continuation_id_for(&request).len(), 24);
    }
}
