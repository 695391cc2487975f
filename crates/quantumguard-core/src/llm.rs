//! Hosted chat-completion bridge for the knowledge query route.
//!
//! OpenAI-compatible wire format: the gateway sends a system+user message
//! pair and reads `choices[0].message.content` back verbatim. The API key
//! (`ZAI_API_KEY`, falling back to `OPENROUTER_API_KEY`) stays in the
//! backend; the frontend never sees it. There are no retries and no
//! circuit breaking; a slow upstream blocks its request until the client
//! timeout fires.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Thin client over a hosted chat-completion API.
pub struct ChatBridge {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

impl ChatBridge {
    /// Create a bridge using the API key from the environment.
    /// Priority: `ZAI_API_KEY` > `OPENROUTER_API_KEY`. Returns `None` when no
    /// key is configured (the gateway then refuses live queries).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ZAI_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())?;
        let key = api_key.trim().to_string();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key))
    }

    /// Create a bridge with an explicit API key. Base URL and model come from
    /// `QG_LLM_API_BASE` / `QG_LLM_MODEL` when set.
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            model: std::env::var("QG_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base: std::env::var("QG_LLM_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            client,
        }
    }

    /// Override the model (e.g. `anthropic/claude-3.5-sonnet`).
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// One chat-completion round trip with a system+user message pair.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!("chat-completion request to {} (model {})", url, self.model);
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: Some(0.3),
            max_tokens: Some(1024),
        };

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("chat-completion request failed: {}", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("chat-completion API error {}: {}", status, body).into());
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| format!("chat-completion response parse failed: {}", e))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_else(|| "No response generated".to_string());

        Ok(text)
    }
}
