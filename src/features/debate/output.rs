//! # Thread Output
//!
//! Seam between the debate engine and Discord. The orchestrator only knows
//! this trait; the serenity implementation lives here so the engine can be
//! exercised in tests with a recording double.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType};
use serenity::model::id::{ChannelId, MessageId};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("not a text channel")]
    UnsupportedContext,
    #[error("discord error: {0}")]
    Platform(String),
}

/// Outbound chat operations the debate engine needs
#[async_trait]
pub trait ThreadOutput: Send + Sync {
    /// Create a public thread under `channel_id` and return its id.
    /// Fails with `UnsupportedContext` outside guild text channels.
    async fn create_thread(&self, channel_id: u64, name: &str) -> Result<u64, OutputError>;

    /// Send a message into a thread, returning its id for later edits
    async fn send_message(&self, thread_id: u64, content: &str) -> Result<u64, OutputError>;

    /// Edit a previously sent message in place
    async fn edit_message(
        &self,
        thread_id: u64,
        message_id: u64,
        content: &str,
    ) -> Result<(), OutputError>;

    /// Lock and archive a thread against further writes
    async fn lock_thread(&self, thread_id: u64) -> Result<(), OutputError>;
}

/// Serenity-backed output
pub struct DiscordOutput {
    http: Arc<Http>,
}

impl DiscordOutput {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordOutput { http }
    }
}

fn platform(error: serenity::Error) -> OutputError {
    OutputError::Platform(error.to_string())
}

#[async_trait]
impl ThreadOutput for DiscordOutput {
    async fn create_thread(&self, channel_id: u64, name: &str) -> Result<u64, OutputError> {
        let channel = self.http.get_channel(channel_id).await.map_err(platform)?;
        let text_channel = match channel {
            Channel::Guild(guild_channel) if guild_channel.kind == ChannelType::Text => {
                guild_channel
            }
            _ => return Err(OutputError::UnsupportedContext),
        };

        // Threads hang off a message, so anchor one carrying the name
        let anchor = text_channel
            .id
            .say(&self.http, name)
            .await
            .map_err(platform)?;
        let thread = text_channel
            .id
            .create_public_thread(&self.http, anchor.id, |t| {
                t.name(name).auto_archive_duration(60)
            })
            .await
            .map_err(platform)?;

        Ok(thread.id.0)
    }

    async fn send_message(&self, thread_id: u64, content: &str) -> Result<u64, OutputError> {
        let message = ChannelId(thread_id)
            .say(&self.http, content)
            .await
            .map_err(platform)?;
        Ok(message.id.0)
    }

    async fn edit_message(
        &self,
        thread_id: u64,
        message_id: u64,
        content: &str,
    ) -> Result<(), OutputError> {
        ChannelId(thread_id)
            .edit_message(&self.http, MessageId(message_id), |m| m.content(content))
            .await
            .map_err(platform)?;
        Ok(())
    }

    async fn lock_thread(&self, thread_id: u64) -> Result<(), OutputError> {
        ChannelId(thread_id)
            .edit_thread(&self.http, |t| t.locked(true).archived(true))
            .await
            .map_err(platform)?;
        Ok(())
    }
}
