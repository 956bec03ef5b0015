//! Groq streaming client (OpenAI-compatible chat completions over SSE)
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{LanguageModelClient, LlmError, TokenReceiver};

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl GroqClient {
    pub fn new(api_key: &str, model: &str, max_tokens: u32) -> Self {
        GroqClient {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        }
    }
}

#[async_trait]
impl LanguageModelClient for GroqClient {
    async fn stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TokenReceiver, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "max_tokens": self.max_tokens,
            "temperature": 0.7,
            "stream": true,
        });

        let response = self
            .client
            .post(GROQ_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut events = Box::pin(response.bytes_stream().eventsource());
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                };

                if event.data == "[DONE]" {
                    break;
                }

                // Malformed chunks are skipped, not fatal
                let chunk: StreamChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("skipping malformed stream chunk: {e}");
                        continue;
                    }
                };

                let token = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content);
                if let Some(token) = token {
                    if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                        // Receiver dropped, generation abandoned
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_chunk() {
        let data = r#"{"id":"cmpl-1","choices":[{"delta":{"content":"Hel"},"index":0}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
    }

    #[test]
    fn test_parse_role_only_chunk() {
        // The first SSE frame often carries only the role
        let data = r#"{"id":"cmpl-1","choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }

    #[test]
    fn test_parse_empty_choices() {
        let data = r#"{"id":"cmpl-1","choices":[]}"#;
        let chunk: StreamChunk = serde_json::from_str(data).unwrap();
        assert!(chunk.choices.is_empty());
    }
}
