//! OpenAI-compatible chat completion client
//!
//! Works against any server exposing the `/chat/completions` shape
//! (OpenAI, Ollama, vLLM, LM Studio). The blocking HTTP call runs on the
//! runtime's blocking pool. Failures are classified into transient
//! (retryable upstream) and fatal so the generator can decide whether to
//! retry.

use super::{ChatMessage, CompletionError, CompletionProvider};
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiChatClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::debug!(
                "No API key in ${}, sending unauthenticated requests",
                config.api_key_env
            );
        }

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Server errors and transport failures are worth retrying; other client
/// errors are not.
fn classify_transport(error: ureq::Error) -> CompletionError {
    match error {
        ureq::Error::StatusCode(code) if code == 429 || code >= 500 => {
            CompletionError::Transient(format!("Server returned status {}", code))
        }
        ureq::Error::StatusCode(code) => {
            CompletionError::Fatal(format!("Server returned status {}", code))
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => CompletionError::Transient(error.to_string()),
        other => CompletionError::Fatal(other.to_string()),
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature,
            max_tokens,
        };

        let agent = self.agent.clone();
        let url = self.endpoint();
        let api_key = self.api_key.clone();

        tokio::task::spawn_blocking(move || {
            let mut builder = agent.post(&url);
            if let Some(key) = &api_key {
                builder = builder.header("Authorization", &format!("Bearer {}", key));
            }

            let mut response = builder.send_json(&request).map_err(classify_transport)?;

            let parsed: ChatResponse = response.body_mut().read_json().map_err(|e| {
                CompletionError::Fatal(format!("Malformed completion response: {}", e))
            })?;

            parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| CompletionError::Fatal("Response contained no choices".to_string()))
        })
        .await
        .map_err(|e| CompletionError::Fatal(format!("Completion task panicked: {}", e)))?
    }
}
