//! # Features layer
//!
//! Feature modules of the bot. Debate orchestration is currently the only
//! feature.

pub mod debate;

pub use debate::{
    DebateError, DebateOrchestrator, DebateSession, DiscordOutput, SessionRegistry,
    StreamAggregator, ThreadOutput,
};
