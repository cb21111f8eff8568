//! Chat-completion client used for intent classification and free-form answers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::ChatMessage,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for LlmMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the assistant text of a single completion. `json_mode` asks the
    /// provider to emit a JSON object.
    async fn complete(&self, messages: &[LlmMessage], json_mode: bool) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.openai_api_key.clone() else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .user_agent(concat!("apex-base-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Some(Self {
            http,
            api_key,
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        }))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[LlmMessage], json_mode: bool) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: if json_mode { 0.0 } else { 0.4 },
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("request failed: {}", e)))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                return Err(AppError::Llm("invalid API key".to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(AppError::Llm("rate limited".to_string()));
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::Llm(format!("http {}: {}", s.as_u16(), body)));
            }
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("invalid response body: {}", e)))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Llm("empty completion".to_string()))
    }
}

/// Converts stored chat history into provider messages.
pub fn history_messages(history: &[ChatMessage]) -> Vec<LlmMessage> {
    history.iter().map(LlmMessage::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_without_key_is_none() {
        let config = crate::config::test_config();
        assert!(OpenAiClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn from_config_with_key_trims_base_url() {
        let mut config = crate::config::test_config();
        config.openai_api_key = Some("sk-test".to_string());
        config.openai_base_url = "http://localhost:9999/v1/".to_string();
        let client = OpenAiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn request_serializes_json_mode() {
        let messages = vec![LlmMessage::user("hi")];
        let request = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn completion_response_parses_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }
}
