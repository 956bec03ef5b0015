//! # Configuration
//!
//! Environment-driven configuration. All values are read once at startup;
//! a `.env` file is honored when present (loaded by the binary via dotenvy).
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Add prompt template overrides and debate channel restriction
//! - 1.1.0: Add Ollama base URL and max tokens
//! - 1.0.0: Initial implementation

use anyhow::{anyhow, bail, Result};
use std::env;

use crate::llm::ApiType;

/// Model used when API_MODEL is not set
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Base URL used for Ollama when API_BASE_URL is not set
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Generation cap used when MAX_TOKENS is not set
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Default system prompt for the opening statement.
///
/// `{topic}` is substituted with the debate topic.
pub const DEFAULT_OPENING_PROMPT: &str = "Topic: {topic}. Make a **BOLD** one sentence opening. \
End with a direct challenge. Keep it SHORT.\n\
To concede say \"you win\" or \"i lose\" or \"i concede\".";

/// Default system prompt for reply turns.
///
/// `{topic}` is substituted with the debate topic, `{context}` with the
/// recent debate history.
pub const DEFAULT_REPLY_PROMPT: &str = "Topic: {topic}\nRecent debate:\n{context}\n\n\
Reply with one sentence. Be aggressive, make bold claims. End with a direct question. \
Keep it SHORT.\n\
To concede say \"you win\" or \"i lose\" or \"i concede\".";

/// Runtime configuration for the bot
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Guild for development-mode command registration (global when unset)
    pub discord_guild_id: Option<String>,
    /// Channel the /debate command is restricted to (any channel when unset)
    pub debate_channel_id: Option<u64>,
    /// Which model API to talk to
    pub api_type: ApiType,
    /// Bearer key for the model API (required for Groq, unused for Ollama)
    pub api_key: String,
    /// Model name sent to the API
    pub api_model: String,
    /// Base URL for the Ollama API
    pub api_base_url: String,
    /// Per-generation token cap
    pub max_tokens: u32,
    /// Opening statement prompt template ({topic})
    pub opening_prompt: String,
    /// Reply prompt template ({topic}, {context})
    pub reply_prompt: String,
    /// env_logger filter, e.g. "info" or "rebuttal=debug"
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let discord_token =
            env::var("DISCORD_TOKEN").map_err(|_| anyhow!("DISCORD_TOKEN is not set"))?;
        if discord_token.trim().is_empty() {
            bail!("DISCORD_TOKEN is empty");
        }

        let api_type_raw = env::var("API_TYPE").unwrap_or_else(|_| "groq".to_string());
        let api_type = ApiType::parse(&api_type_raw)
            .ok_or_else(|| anyhow!("API_TYPE must be 'groq' or 'ollama', got '{api_type_raw}'"))?;

        let api_key = env::var("API_KEY").unwrap_or_default();
        if api_type == ApiType::Groq && api_key.trim().is_empty() {
            bail!("API_KEY is required when API_TYPE is groq");
        }

        let debate_channel_id = match env::var("DEBATE_CHANNEL_ID") {
            Ok(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| anyhow!("DEBATE_CHANNEL_ID must be a numeric channel id"))?,
            ),
            Err(_) => None,
        };

        let max_tokens = env::var("MAX_TOKENS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Ok(Config {
            discord_token,
            discord_guild_id: env::var("DISCORD_GUILD_ID").ok(),
            debate_channel_id,
            api_type,
            api_key,
            api_model: env::var("API_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            max_tokens,
            opening_prompt: env::var("OPENING_PROMPT")
                .unwrap_or_else(|_| DEFAULT_OPENING_PROMPT.to_string()),
            reply_prompt: env::var("REPLY_PROMPT")
                .unwrap_or_else(|_| DEFAULT_REPLY_PROMPT.to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
