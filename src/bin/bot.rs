use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::Interaction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use std::sync::Arc;

use rebuttal::commands::{debate::handle_debate, register_global_commands, register_guild_commands};
use rebuttal::core::Config;
use rebuttal::features::debate::{
    DebateOrchestrator, DiscordOutput, SessionRegistry, IDLE_THRESHOLD, SWEEP_INTERVAL,
};
use rebuttal::llm::create_client;

struct Handler {
    orchestrator: Arc<DebateOrchestrator>,
    debate_channel_id: Option<u64>,
    guild_id: Option<GuildId>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        // Never block the gateway task on a model call; the orchestrator
        // decides whether the message belongs to a debate at all
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            orchestrator
                .handle_message(msg.channel_id.0, msg.author.bot, &msg.content)
                .await;
        });
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎤 {} is connected and watching for debates", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());

        // Guild commands for development (instant), global for production
        if let Some(guild_id) = self.guild_id {
            info!("🔧 Development mode: Registering commands for guild {guild_id}");
            if let Err(e) = register_guild_commands(&ctx, guild_id).await {
                error!("❌ Failed to register guild slash commands: {e}");
            }
        } else {
            info!("🌍 Production mode: Registering commands globally");
            if let Err(e) = register_global_commands(&ctx).await {
                error!("❌ Failed to register global slash commands: {e}");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::ApplicationCommand(command) = interaction {
            if command.data.name != "debate" {
                return;
            }
            if let Err(e) = handle_debate(
                Arc::clone(&self.orchestrator),
                self.debate_channel_id,
                &ctx,
                &command,
            )
            .await
            {
                error!("Error handling /debate: {e}");
                let _ = command
                    .create_interaction_response(&ctx.http, |response| {
                        response
                            .kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|message| {
                                message.content(
                                    "Sorry, I encountered an error processing your command.",
                                )
                            })
                    })
                    .await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting rebuttal with {:?} API...", config.api_type);

    let registry = Arc::new(SessionRegistry::new());
    let _sweeper = Arc::clone(&registry).spawn_sweep(SWEEP_INTERVAL, IDLE_THRESHOLD);

    let llm = create_client(&config);
    let http = Arc::new(Http::new(&config.discord_token));
    let output = Arc::new(DiscordOutput::new(http));
    let orchestrator = Arc::new(DebateOrchestrator::new(
        registry,
        llm,
        output,
        config.opening_prompt.clone(),
        config.reply_prompt.clone(),
    ));

    // Parse guild ID if provided for development mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler {
        orchestrator,
        debate_channel_id: config.debate_channel_id,
        guild_id,
    };

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    Ok(())
}
