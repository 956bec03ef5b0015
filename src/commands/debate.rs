//! # Debate Command
//!
//! Defines and handles /debate: starts a threaded debate between the
//! invoking human and the model on a given topic.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Optional opening/reply prompt overrides
//! - 1.0.0: Initial implementation

use anyhow::Result;
use log::{error, info};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::Context;
use std::sync::Arc;
use uuid::Uuid;

use crate::features::debate::{DebateError, DebateOrchestrator};

use super::get_string_option;

/// Topic length limits enforced by Discord option validation
const MIN_TOPIC_LEN: u16 = 5;
const MAX_TOPIC_LEN: u16 = 500;

pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![create_debate_command()]
}

fn create_debate_command() -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name("debate")
        .description("Challenge the AI to a debate in a new thread")
        .create_option(|option| {
            option
                .name("topic")
                .description("The topic or question to debate")
                .kind(CommandOptionType::String)
                .required(true)
                .min_length(MIN_TOPIC_LEN)
                .max_length(MAX_TOPIC_LEN)
        })
        .create_option(|option| {
            option
                .name("opening_prompt")
                .description("Custom opening system prompt ({topic} is substituted)")
                .kind(CommandOptionType::String)
                .required(false)
        })
        .create_option(|option| {
            option
                .name("reply_prompt")
                .description("Custom reply system prompt ({topic} and {context} are substituted)")
                .kind(CommandOptionType::String)
                .required(false)
        });
    command
}

/// Handle a /debate invocation
///
/// Responds immediately, then spawns the debate setup and opening turn onto
/// a worker task; setup failures edit the response in place.
pub async fn handle_debate(
    orchestrator: Arc<DebateOrchestrator>,
    debate_channel_id: Option<u64>,
    ctx: &Context,
    command: &ApplicationCommandInteraction,
) -> Result<()> {
    let request_id = Uuid::new_v4();

    let topic = get_string_option(&command.data.options, "topic")
        .ok_or_else(|| anyhow::anyhow!("Missing topic argument"))?;
    let opening_override = get_string_option(&command.data.options, "opening_prompt");
    let reply_override = get_string_option(&command.data.options, "reply_prompt");

    if let Some(required) = debate_channel_id {
        if command.channel_id.0 != required {
            command
                .create_interaction_response(&ctx.http, |r| {
                    r.kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|message| {
                            message
                                .content("Debates are not enabled in this channel.")
                                .ephemeral(true)
                        })
                })
                .await?;
            return Ok(());
        }
    }

    info!(
        "[{request_id}] /debate on '{topic}' from user {}",
        command.user.id
    );

    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| {
                    message.content(format!("**Debate Starting!**\n\n**Topic:** {topic}"))
                })
        })
        .await?;

    let channel_id = command.channel_id.0;
    let leader_id = command.user.id.0;
    let http = ctx.http.clone();
    let command = command.clone();
    tokio::spawn(async move {
        match orchestrator
            .start_debate(channel_id, leader_id, &topic, opening_override, reply_override)
            .await
        {
            Ok(thread_id) => {
                info!("[{request_id}] debate running in thread {thread_id}");
            }
            Err(e) => {
                let notice = match &e {
                    DebateError::AlreadyExists(_) => {
                        "A debate is already running in this thread.".to_string()
                    }
                    DebateError::UnsupportedContext => {
                        "Debates can only be started in a text channel.".to_string()
                    }
                    other => {
                        error!("[{request_id}] debate setup failed: {other}");
                        "The debate could not be started. Please try again.".to_string()
                    }
                };
                let _ = command
                    .edit_original_interaction_response(&http, |r| {
                        r.content(format!("**Debate Failed**\n\n{notice}"))
                    })
                    .await;
            }
        }
    });

    Ok(())
}
