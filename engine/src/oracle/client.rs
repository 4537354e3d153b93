//! OpenAI-compatible chat-completions oracle.
//!
//! Works against any `/v1/chat/completions` endpoint, including a local
//! Ollama server. One request per call, temperature 0, no retries.

use super::{FixRequest, PatchOracle};
use crate::error::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Oracle endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    pub model: String,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "qwen2.5-coder:14b".to_string(),
            api_key: None,
            max_tokens: 8192,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// [`PatchOracle`] backed by an HTTP chat-completions endpoint
pub struct ChatCompletionsOracle {
    config: OracleConfig,
    http: reqwest::Client,
}

impl ChatCompletionsOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn transport_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PatchOracle for ChatCompletionsOracle {
    async fn request_fix(&self, request: &FixRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.render(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
        };

        tracing::info!(
            model = %self.config.model,
            files = request.bundle.len(),
            kind = request.diagnosis.kind(),
            "Requesting fix from oracle"
        );

        let mut builder = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                OracleError::Decode(e.to_string())
            }
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(chars = content.len(), "Oracle responded");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: 16,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 16);
    }

    #[test]
    fn test_missing_content_decodes_as_empty() {
        let chat: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        assert!(content.is_empty());

        let chat: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(chat.choices.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert!(config.endpoint.ends_with("/v1/chat/completions"));
        assert!(config.api_key.is_none());
        assert_eq!(config.max_tokens, 8192);
    }
}
