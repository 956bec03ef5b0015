//! # Language Model Clients
//!
//! Streaming clients for the model APIs the debate engine talks to. Each
//! call opens an independent stream; tokens arrive on a channel owned by a
//! worker task, so concurrent debates never share a connection.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add Ollama client and ApiType selector
//! - 1.0.0: Initial implementation with Groq streaming

pub mod groq;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::Config;

pub use groq::GroqClient;
pub use ollama::OllamaClient;

/// Channel of streamed tokens. Closure of the channel is the completion
/// signal; an `Err` item is a hard stream error.
pub type TokenReceiver = mpsc::Receiver<Result<String, LlmError>>;

/// Errors from the model APIs
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("stream error: {0}")]
    Stream(String),
}

/// A streaming language model endpoint.
///
/// Implementations must support concurrent independent invocations; the
/// orchestrator may drive several debates at once.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Start a generation and return the token channel.
    ///
    /// Fails fast when the request cannot be opened (connection refused,
    /// non-2xx status). Mid-stream failures arrive as `Err` items instead.
    async fn stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TokenReceiver, LlmError>;
}

/// Which model API to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    Groq,
    Ollama,
}

impl ApiType {
    /// Parse the API_TYPE configuration value
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "groq" => Some(ApiType::Groq),
            "ollama" => Some(ApiType::Ollama),
            _ => None,
        }
    }
}

/// Build the configured model client
pub fn create_client(config: &Config) -> Arc<dyn LanguageModelClient> {
    match config.api_type {
        ApiType::Groq => Arc::new(GroqClient::new(
            &config.api_key,
            &config.api_model,
            config.max_tokens,
        )),
        ApiType::Ollama => Arc::new(OllamaClient::new(
            &config.api_model,
            &config.api_base_url,
            config.max_tokens,
        )),
    }
}
