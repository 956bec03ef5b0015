//! Ollama streaming client (`/api/generate`, newline-delimited JSON)
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.5.0

use async_trait::async_trait;
use futures::StreamExt;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{LanguageModelClient, LlmError, TokenReceiver};

pub struct OllamaClient {
    client: Client,
    model: String,
    base_url: String,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

impl OllamaClient {
    pub fn new(model: &str, base_url: &str, num_predict: u32) -> Self {
        let base_url = normalize_base_url(base_url);
        info!("OllamaClient initialized: {base_url} -> {model}");
        OllamaClient {
            client: Client::new(),
            model: model.to_string(),
            base_url,
            num_predict,
        }
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "prompt": format!("{system_prompt}\n\n{user_prompt}"),
            "stream": true,
            "options": {
                "temperature": 0.7,
                "top_p": 0.9,
                "num_predict": self.num_predict,
            },
        })
    }
}

/// Pin "localhost" to the IPv4 loopback and ensure a trailing slash
fn normalize_base_url(base_url: &str) -> String {
    let url = base_url.replace("localhost", "127.0.0.1");
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}

#[async_trait]
impl LanguageModelClient for OllamaClient {
    async fn stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TokenReceiver, LlmError> {
        let body = self.request_body(system_prompt, user_prompt);

        let response = self
            .client
            .post(format!("{}api/generate", self.base_url))
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
            let mut bytes = Box::pin(response.bytes_stream());
            let mut buffer = String::new();
            'stream: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GenerateChunk>(line) {
                        Ok(parsed) => {
                            if let Some(token) = parsed.response {
                                if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                                    return;
                                }
                            }
                            if parsed.done {
                                break 'stream;
                            }
                        }
                        Err(_) => warn!("failed to parse ollama line: {line}"),
                    }
                }
            }
        });

        Ok(rx)
    }
}
