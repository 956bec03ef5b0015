// Core layer - configuration and shared text utilities
pub mod core;

// Features layer - the debate engine
pub mod features;

// Language model layer - streaming clients
pub mod llm;

// Application layer - slash commands
pub mod commands;

// Re-export core config for convenience
pub use core::Config;

// Re-export the debate engine surface
pub use features::debate::{
    DebateError, DebateOrchestrator, DebateSession, DiscordOutput, SessionRegistry, Speaker,
    StreamAggregator, StreamUpdate, ThreadOutput,
};

// Re-export model client items
pub use llm::{create_client, ApiType, LanguageModelClient, LlmError};
