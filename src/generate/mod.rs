//! Answer generation against an external completion service
//!
//! Owns the prompting contract for the three generation modes (grounded,
//! full-context fallback, conversational) while delegating token
//! generation to a [`CompletionProvider`]. Transient provider failures are
//! retried with bounded exponential backoff; anything else surfaces as
//! `Unavailable` so the orchestrator can map it to an error response
//! instead of crashing.

mod openai;

pub use openai::OpenAiChatClient;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    /// Timeouts, rate limits, connection failures - worth retrying
    #[error("Transient provider failure: {0}")]
    Transient(String),

    /// Malformed request, auth failure, bad response - retrying won't help
    #[error("Provider request failed: {0}")]
    Fatal(String),

    /// Terminal verdict after the retry budget is spent
    #[error("Completion service unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },
}

/// Message role in the completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// Role-tagged prompt message
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// External text-completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

/// Builds prompts and drives the provider with retry and timeout
pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
    config: LlmConfig,
    refusal: String,
}

impl Generator {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: LlmConfig, refusal: String) -> Self {
        Self {
            provider,
            config,
            refusal,
        }
    }

    /// Grounded mode: the model may only use the retrieved context and
    /// must emit the canonical refusal when the answer is absent.
    pub async fn grounded(&self, query: &str, context: &str) -> Result<String, CompletionError> {
        let messages = vec![
            ChatMessage::system(format!(
                "You are an expert information retrieval assistant. Answer using ONLY the \
                 provided context, never outside knowledge. If the answer is not in the \
                 context, reply exactly \"{}\".",
                self.refusal
            )),
            ChatMessage::user(format!(
                "Use the following context to answer the question.\n\
                 If you cannot find the answer in the context, reply \"{}\".\n\n\
                 Context:\n{}\n\nQuestion: {}\n\nAnswer:",
                self.refusal, context, query
            )),
        ];
        self.complete_with_retry(&messages).await
    }

    /// Full-context fallback: same contract as grounded mode, but the
    /// context is the (possibly truncated) whole corpus.
    pub async fn full_context(&self, query: &str, context: &str) -> Result<String, CompletionError> {
        let messages = vec![
            ChatMessage::system(format!(
                "You are a helpful assistant that answers questions based ONLY on the \
                 provided document corpus. Rules: answer only with information from the \
                 corpus; if the information is not there, reply exactly \"{}\"; be concise \
                 and direct; answer in the language of the question.",
                self.refusal
            )),
            ChatMessage::user(format!(
                "Document corpus:\n{}\n\nQuestion: {}\n\n\
                 Please answer based only on the corpus above.",
                context, query
            )),
        ];
        self.complete_with_retry(&messages).await
    }

    /// Conversational mode for greeting-like queries. No retrieval, no
    /// grounding constraint.
    pub async fn conversational(&self, query: &str) -> Result<String, CompletionError> {
        let messages = vec![
            ChatMessage::system(
                "You are a friendly assistant for a document question answering system. \
                 Answer briefly and conversationally.",
            ),
            ChatMessage::user(query.to_string()),
        ];
        self.complete_with_retry(&messages).await
    }

    async fn complete_with_retry(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut last_message = String::new();

        for attempt in 0..self.config.max_retries {
            let call = self
                .provider
                .complete(messages, self.config.temperature, self.config.max_tokens);

            let outcome = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(CompletionError::Transient(format!(
                    "provider call timed out after {:?}",
                    timeout
                ))),
            };

            match outcome {
                Ok(text) => return Ok(text),
                Err(CompletionError::Transient(message)) => {
                    last_message = message;
                    if attempt + 1 < self.config.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Attempt {} failed ({}), retrying in {:?}",
                            attempt + 1,
                            last_message,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(CompletionError::Fatal(message)) => {
                    tracing::error!("Non-retryable provider failure: {}", message);
                    return Err(CompletionError::Unavailable {
                        attempts: attempt + 1,
                        message,
                    });
                }
                Err(unavailable @ CompletionError::Unavailable { .. }) => return Err(unavailable),
            }
        }

        Err(CompletionError::Unavailable {
            attempts: self.config.max_retries,
            message: last_message,
        })
    }
}
